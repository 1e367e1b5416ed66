/**
 * Routes Module
 * API route handlers, shared state and the reply envelope
 */
pub mod account;
pub mod auth;
pub mod content;
pub mod favourites;
pub mod feedback;
pub mod health;
pub mod objects;
pub mod tours;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

use crate::auth::{extract_bearer_token, Identity, TokenService};
use crate::blob::BlobStore;
use crate::config::AppConfig;
use crate::db::Db;
use crate::error::{ServiceError, ServiceResult};

/// Shared handles passed to every handler.
pub struct AppState {
    pub db: Db,
    pub tokens: TokenService,
    pub blobs: BlobStore,
    pub config: AppConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: Db, config: AppConfig) -> Self {
        Self {
            db,
            tokens: TokenService::new(&config),
            blobs: BlobStore::new(config.upload_dir.clone(), config.max_upload_bytes),
            config,
        }
    }
}

// ============================================================================
// Reply envelope
// ============================================================================

/// Three-valued `ok`: absent when the caller is not authenticated, otherwise
/// the business outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<V> {
    Unauthenticated,
    Present(V),
}

impl<V> Signal<V> {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Signal::Unauthenticated)
    }
}

impl<V> Default for Signal<V> {
    fn default() -> Self {
        Signal::Unauthenticated
    }
}

impl<V: Serialize> Serialize for Signal<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Signal::Present(value) => value.serialize(serializer),
            Signal::Unauthenticated => serializer.serialize_none(),
        }
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Signal<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<V>::deserialize(deserializer)? {
            Some(value) => Signal::Present(value),
            None => Signal::Unauthenticated,
        })
    }
}

/// Mutation and query reply: `{ ok, data, error? }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Reply<T, V = bool> {
    #[serde(default, skip_serializing_if = "Signal::is_unauthenticated")]
    pub ok: Signal<V>,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize, V: Serialize> Reply<T, V> {
    pub fn present(ok: V, data: Option<T>, error: Option<String>) -> Self {
        Self {
            ok: Signal::Present(ok),
            data,
            error,
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Message exposed to the client. Missing records and denied access are not
/// told apart.
pub fn public_reason(err: &ServiceError) -> Option<String> {
    match err {
        ServiceError::NotFound | ServiceError::Forbidden => None,
        e if e.is_internal() => Some("Internal server error".to_string()),
        e => Some(e.to_string()),
    }
}

/// Status for a failed operation, logging it at a level matching its cause.
pub fn failure_status(err: &ServiceError) -> StatusCode {
    if err.is_internal() {
        tracing::error!(error = %err, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        tracing::debug!(error = %err, "request declined");
        StatusCode::OK
    }
}

/// Map a service outcome to the standard `{ ok: bool }` envelope.
pub fn reply<T: Serialize>(result: ServiceResult<T>) -> Response {
    match result {
        Ok(data) => Reply::<T>::present(true, Some(data), None).into_response_with(StatusCode::OK),
        Err(err) => {
            let status = failure_status(&err);
            Reply::<T>::present(false, None, public_reason(&err)).into_response_with(status)
        }
    }
}

/// 401 envelope with `ok` absent.
pub fn unauthenticated() -> Response {
    let body: Reply<()> = Reply {
        ok: Signal::Unauthenticated,
        data: None,
        error: Some("Invalid or expired token".to_string()),
    };
    body.into_response_with(StatusCode::UNAUTHORIZED)
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Auth gate
// ============================================================================

/// Identity of a caller holding a valid access token. Requests without one
/// are answered with [`unauthenticated`] before the handler runs.
pub struct Authenticated(pub Identity);

impl FromRequestParts<SharedState> for Authenticated {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        extract_bearer_token(&parts.headers)
            .and_then(|token| state.tokens.verify_access(token))
            .map(Authenticated)
            .ok_or_else(unauthenticated)
    }
}

/**
 * Authentication Routes
 * Account creation, login and access-token refresh
 */
use axum::{extract::State, http::StatusCode, response::Response, Json};
use serde::{Deserialize, Serialize};

use super::{reply, unauthenticated, Reply, SharedState};
use crate::services::account;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/register
pub async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<CredentialsRequest>,
) -> Response {
    reply(
        account::create_account(
            &state.db,
            state.config.bcrypt_cost,
            &payload.username,
            &payload.password,
        )
        .await,
    )
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<CredentialsRequest>,
) -> Response {
    let result =
        account::login(
            &state.db,
            &state.tokens,
            state.config.bcrypt_cost,
            &payload.username,
            &payload.password,
        )
        .await;
    if result.is_ok() {
        tracing::info!(username = %payload.username, "login successful");
    }
    reply(result)
}

/// POST /api/auth/refresh
/// Only a valid refresh token is accepted; the refresh token itself is not
/// reissued.
pub async fn refresh(
    State(state): State<SharedState>,
    Json(payload): Json<RefreshRequest>,
) -> Response {
    let Some(caller) = state.tokens.verify_refresh(&payload.refresh_token) else {
        return unauthenticated();
    };
    match account::refresh(&state.db, &state.tokens, &caller).await {
        Ok(access_token) => Reply::present(true, Some(RefreshResponse { access_token }), None)
            .into_response_with(StatusCode::OK),
        Err(err) => reply::<RefreshResponse>(Err(err)),
    }
}

/**
 * Museum Object and Picture Routes
 */
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use super::{reply, Authenticated, ErrorResponse, SharedState};
use crate::error::{BlobError, ServiceError};
use crate::services::objects::{self, ObjectQuery};

/// GET /api/objects?category=..&creator=..
pub async fn search(
    State(state): State<SharedState>,
    Authenticated(_caller): Authenticated,
    Query(query): Query<ObjectQuery>,
) -> Response {
    reply(objects::search_objects(&state.db, query).await)
}

/// GET /api/pictures/{picture_id}
/// Raw image bytes with their detected content type.
pub async fn get_picture(
    State(state): State<SharedState>,
    Path(picture_id): Path<Uuid>,
) -> Response {
    match objects::picture_bytes(&state.db, &state.blobs, picture_id).await {
        Ok((blob, bytes)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, blob.content_type),
                (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
            ],
            bytes,
        )
            .into_response(),
        Err(ServiceError::NotFound) | Err(ServiceError::Blob(BlobError::InvalidKey)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Picture not found".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(picture = %picture_id, error = %e, "failed to read picture");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to read picture".to_string(),
                }),
            )
                .into_response()
        }
    }
}

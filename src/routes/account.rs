/**
 * Account Routes
 * Profile, password, deletion, promotion, badges and profile picture
 */
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{reply, Authenticated, SharedState};
use crate::services::account;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct BadgeProgressRequest {
    pub progress: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePictureRequest {
    pub picture_id: Uuid,
}

/// GET /api/account
pub async fn me(State(state): State<SharedState>, Authenticated(caller): Authenticated) -> Response {
    reply(account::current_user(&state.db, &caller).await)
}

/// DELETE /api/account
pub async fn delete_account(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
) -> Response {
    reply(account::delete_account(&state.db, &caller).await)
}

/// POST /api/account/password
pub async fn change_password(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<ChangePasswordRequest>,
) -> Response {
    reply(
        account::change_password(
            &state.db,
            state.config.bcrypt_cost,
            &caller,
            &payload.password,
        )
        .await,
    )
}

/// POST /api/account/promote
pub async fn promote(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<PromoteRequest>,
) -> Response {
    reply(account::promote_user(&state.db, &caller, &payload.code).await)
}

/// POST /api/account/badges/{badge_id}
pub async fn add_badge_progress(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(badge_id): Path<Uuid>,
    Json(payload): Json<BadgeProgressRequest>,
) -> Response {
    reply(account::add_badge_progress(&state.db, &caller, badge_id, payload.progress).await)
}

/// POST /api/account/profile-picture
pub async fn choose_profile_picture(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<ProfilePictureRequest>,
) -> Response {
    reply(account::choose_profile_picture(&state.db, &caller, payload.picture_id).await)
}

/**
 * Tour Routes
 * Tour lifecycle, membership, attachments, feedback and answer listings
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{failure_status, public_reason, reply, Authenticated, Reply, SharedState};
use crate::db::models::Tour;
use crate::error::ServiceError;
use crate::services::{content, feedback, tour};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRequest {
    pub object_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    pub question_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub rating: i32,
    pub review: String,
}

/// Outcome string carried in CreateTour's `ok`.
fn create_outcome(err: &ServiceError) -> String {
    match err {
        ServiceError::NotProducer | ServiceError::SearchIdInUse => err.to_string(),
        _ => "failure".to_string(),
    }
}

/// POST /api/tours
/// `ok` is "success", "user is not producer" or "search id already in use".
pub async fn create_tour(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<tour::NewTour>,
) -> Response {
    match tour::create_tour(&state.db, &caller, payload).await {
        Ok(created) => Reply::present("success".to_string(), Some(created), None)
            .into_response_with(StatusCode::OK),
        Err(err) => {
            let status = failure_status(&err);
            Reply::<Tour, String>::present(create_outcome(&err), None, public_reason(&err))
                .into_response_with(status)
        }
    }
}

/// GET /api/tours
pub async fn my_tours(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
) -> Response {
    reply(tour::my_tours(&state.db, &caller).await)
}

/// GET /api/tours/owned
pub async fn owned_tours(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
) -> Response {
    reply(tour::owned_tours(&state.db, &caller).await)
}

/// GET /api/tours/{tour_id}
pub async fn get_tour(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
) -> Response {
    reply(tour::tour(&state.db, &caller, tour_id).await)
}

/// POST /api/tours/{tour_id}/join
pub async fn join(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
    Json(payload): Json<SessionRequest>,
) -> Response {
    reply(tour::add_member(&state.db, &caller, tour_id, payload.session_id).await)
}

/// DELETE /api/tours/{tour_id}/members/{username}
pub async fn remove_user(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path((tour_id, username)): Path<(Uuid, String)>,
) -> Response {
    reply(tour::remove_user(&state.db, &caller, tour_id, &username).await)
}

/// PUT /api/tours/{tour_id}/session
pub async fn update_session(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
    Json(payload): Json<SessionRequest>,
) -> Response {
    reply(tour::update_session_id(&state.db, &caller, tour_id, payload.session_id).await)
}

/// POST /api/tours/{tour_id}/review
pub async fn submit_review(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
) -> Response {
    reply(tour::submit_review(&state.db, &caller, tour_id).await)
}

/// POST /api/tours/{tour_id}/objects
pub async fn add_object(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
    Json(payload): Json<ObjectRequest>,
) -> Response {
    reply(tour::add_object(&state.db, &caller, tour_id, &payload.object_id).await)
}

/// DELETE /api/tours/{tour_id}/objects/{object_id}
pub async fn remove_object(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path((tour_id, object_id)): Path<(Uuid, String)>,
) -> Response {
    reply(tour::remove_object(&state.db, &caller, tour_id, &object_id).await)
}

/// GET /api/tours/{tour_id}/questions
pub async fn list_questions(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
) -> Response {
    reply(content::tour_questions(&state.db, &caller, tour_id).await)
}

/// POST /api/tours/{tour_id}/questions
pub async fn add_question(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
    Json(payload): Json<QuestionRequest>,
) -> Response {
    reply(tour::add_question(&state.db, &caller, tour_id, payload.question_id).await)
}

/// DELETE /api/tours/{tour_id}/questions/{question_id}
pub async fn remove_question(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path((tour_id, question_id)): Path<(Uuid, Uuid)>,
) -> Response {
    reply(tour::remove_question(&state.db, &caller, tour_id, question_id).await)
}

/// GET /api/tours/{tour_id}/checkpoints
pub async fn list_checkpoints(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
) -> Response {
    reply(content::tour_checkpoints(&state.db, &caller, tour_id).await)
}

/// POST /api/tours/{tour_id}/feedback
pub async fn submit_feedback(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
    Json(payload): Json<FeedbackRequest>,
) -> Response {
    reply(
        feedback::submit_tour_feedback(
            &state.db,
            &caller,
            tour_id,
            payload.rating,
            payload.review,
        )
        .await,
    )
}

/// GET /api/tours/{tour_id}/feedback
pub async fn list_feedback(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
) -> Response {
    reply(feedback::tour_feedback(&state.db, &caller, tour_id).await)
}

/// GET /api/tours/{tour_id}/answers
pub async fn my_answers(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
) -> Response {
    reply(content::my_answers(&state.db, &caller, tour_id).await)
}

/// GET /api/tours/{tour_id}/answers/{username}
pub async fn answers_by_user(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path((tour_id, username)): Path<(Uuid, String)>,
) -> Response {
    reply(content::answers_by_user(&state.db, &caller, tour_id, &username).await)
}

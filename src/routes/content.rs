/**
 * Content Routes
 * Questions, answers and checkpoints
 */
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{failure_status, public_reason, reply, Authenticated, SharedState, Signal};
use crate::db::models::Answer;
use crate::error::ServiceError;
use crate::services::content::{self, NewQuestion, PictureSource};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    pub tour_id: Uuid,
    #[serde(flatten)]
    pub question: NewQuestion,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question: Uuid,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct McAnswerRequest {
    pub question: Uuid,
    pub answer: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRequest {
    pub tour_id: Uuid,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCheckpointRequest {
    pub tour_id: Uuid,
    pub object_id: String,
    pub text: Option<String>,
}

/// Multiple-choice reply: the envelope plus the score. `correct` is -1 when
/// too many answers were selected and 0 on any other failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct McAnswerReply {
    #[serde(default, skip_serializing_if = "Signal::is_unauthenticated")]
    pub ok: Signal<bool>,
    pub data: Option<Answer>,
    pub correct: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/questions
pub async fn create_question(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<CreateQuestionRequest>,
) -> Response {
    reply(content::create_question(&state.db, &caller, payload.tour_id, payload.question).await)
}

/// GET /api/questions/{question_id}/answers
pub async fn answers_to_question(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(question_id): Path<Uuid>,
) -> Response {
    reply(content::answers_to_question(&state.db, &caller, question_id).await)
}

/// POST /api/answers
pub async fn submit_answer(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<AnswerRequest>,
) -> Response {
    reply(content::submit_answer(&state.db, &caller, payload.question, payload.answer).await)
}

/// POST /api/answers/multiple-choice
pub async fn submit_mc_answer(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<McAnswerRequest>,
) -> Response {
    let (status, body) =
        match content::submit_mc_answer(&state.db, &caller, payload.question, payload.answer).await
        {
            Ok((answer, correct)) => (
                StatusCode::OK,
                McAnswerReply {
                    ok: Signal::Present(true),
                    data: Some(answer),
                    correct: correct as i32,
                    error: None,
                },
            ),
            Err(err) => (
                failure_status(&err),
                McAnswerReply {
                    ok: Signal::Present(false),
                    data: None,
                    correct: if matches!(err, ServiceError::TooManyChoices) { -1 } else { 0 },
                    error: public_reason(&err),
                },
            ),
        };
    (status, Json(body)).into_response()
}

/// POST /api/checkpoints
pub async fn create_checkpoint(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<CheckpointRequest>,
) -> Response {
    reply(content::create_checkpoint(&state.db, &caller, payload.tour_id, payload.text).await)
}

/// POST /api/checkpoints/object
pub async fn create_object_checkpoint(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<ObjectCheckpointRequest>,
) -> Response {
    reply(
        content::create_object_checkpoint(
            &state.db,
            &caller,
            payload.tour_id,
            &payload.object_id,
            payload.text,
        )
        .await,
    )
}

/// Fields of a picture checkpoint form.
#[derive(Debug, Default)]
struct PictureForm {
    tour_id: Option<Uuid>,
    picture_id: Option<Uuid>,
    picture: Option<Vec<u8>>,
    picture_description: Option<String>,
    text: Option<String>,
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, ServiceError> {
    value
        .trim()
        .parse()
        .map_err(|_| ServiceError::Invalid(format!("{} is not a valid id", field)))
}

async fn read_picture_form(mut multipart: Multipart) -> Result<PictureForm, ServiceError> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        ServiceError::Invalid(format!("invalid multipart data: {}", e))
    };
    let mut form = PictureForm::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "picture" => form.picture = Some(field.bytes().await.map_err(invalid)?.to_vec()),
            "tourId" => form.tour_id = Some(parse_uuid("tourId", &field.text().await.map_err(invalid)?)?),
            "pictureId" => {
                form.picture_id = Some(parse_uuid("pictureId", &field.text().await.map_err(invalid)?)?)
            }
            "pictureDescription" => form.picture_description = Some(field.text().await.map_err(invalid)?),
            "text" => form.text = Some(field.text().await.map_err(invalid)?),
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }
    Ok(form)
}

/// POST /api/checkpoints/picture (multipart)
/// Fields: `tourId`, `text`, and either `pictureId` or `picture` plus
/// `pictureDescription`.
pub async fn create_picture_checkpoint(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    multipart: Multipart,
) -> Response {
    let result = async {
        let form = read_picture_form(multipart).await?;
        let tour_id = form
            .tour_id
            .ok_or_else(|| ServiceError::Invalid("tourId is required".into()))?;
        let source = match (form.picture_id, form.picture) {
            (Some(id), _) => PictureSource::Existing(id),
            (None, Some(bytes)) => PictureSource::Upload {
                bytes,
                description: form.picture_description,
            },
            (None, None) => {
                return Err(ServiceError::Invalid(
                    "either pictureId or picture is required".into(),
                ))
            }
        };
        content::create_picture_checkpoint(
            &state.db,
            &state.blobs,
            &caller,
            tour_id,
            source,
            form.text,
        )
        .await
    }
    .await;
    reply(result)
}

/**
 * Feedback Routes
 * Anonymous app feedback
 */
use axum::{extract::State, response::Response, Json};
use serde::Deserialize;

use super::{reply, Authenticated, SharedState};
use crate::services::feedback;

#[derive(Debug, Deserialize)]
pub struct AppFeedbackRequest {
    pub rating: i32,
    pub review: String,
}

/// POST /api/feedback
pub async fn send_feedback(
    State(state): State<SharedState>,
    Authenticated(_caller): Authenticated,
    Json(payload): Json<AppFeedbackRequest>,
) -> Response {
    reply(feedback::send_app_feedback(&state.db, payload.rating, payload.review).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{login, send, state};
    use axum::http::StatusCode;
    use axum::{routing::post, Router};
    use serde_json::json;

    #[tokio::test]
    async fn test_app_feedback_rating_bounds() {
        let state = state();
        let token = login(&state, "ada").await;
        let app = Router::new()
            .route("/api/feedback", post(send_feedback))
            .with_state(state);

        for (rating, expected) in [(0, false), (1, true), (5, true), (6, false)] {
            let (status, body) = send(
                app.clone(),
                "POST",
                "/api/feedback",
                Some(&token),
                Some(json!({ "rating": rating, "review": "fine" })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["ok"], expected, "rating {}", rating);
        }
    }
}

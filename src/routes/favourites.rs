/**
 * Favourites Routes
 */
use axum::{
    extract::{Path, State},
    response::Response,
};
use uuid::Uuid;

use super::{reply, Authenticated, SharedState};
use crate::services::favourites;

/// GET /api/favourites
pub async fn get_favourites(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
) -> Response {
    reply(favourites::favourites(&state.db, &caller).await)
}

/// POST /api/favourites/objects/{object_id}
pub async fn add_object(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(object_id): Path<String>,
) -> Response {
    reply(favourites::add_object(&state.db, &caller, &object_id).await)
}

/// DELETE /api/favourites/objects/{object_id}
pub async fn remove_object(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(object_id): Path<String>,
) -> Response {
    reply(favourites::remove_object(&state.db, &caller, &object_id).await)
}

/// POST /api/favourites/tours/{tour_id}
pub async fn add_tour(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
) -> Response {
    reply(favourites::add_tour(&state.db, &caller, tour_id).await)
}

/// DELETE /api/favourites/tours/{tour_id}
pub async fn remove_tour(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    Path(tour_id): Path<Uuid>,
) -> Response {
    reply(favourites::remove_tour(&state.db, &caller, tour_id).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{login, send, state};
    use axum::http::StatusCode;
    use axum::{routing::post, Router};

    #[tokio::test]
    async fn test_remove_never_added_favourite() {
        let state = state();
        let token = login(&state, "ada").await;
        let app = Router::new()
            .route(
                "/api/favourites/objects/{object_id}",
                post(add_object).delete(remove_object),
            )
            .with_state(state);

        let (status, body) = send(app.clone(), "DELETE", "/api/favourites/objects/INV-1", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["favouriteObjects"], serde_json::json!([]));

        let (_, body) = send(app, "POST", "/api/favourites/objects/INV-1", Some(&token), None).await;
        assert_eq!(body["ok"], false);
    }
}

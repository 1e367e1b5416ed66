//! Museum Tour Backend - library for app logic and testing

pub mod auth;
pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod routes;
pub mod services;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use config::AppConfig;
use db::{Db, PgDocumentStore};
use routes::{AppState, SharedState};

/// Multipart framing on top of the largest accepted picture.
const BODY_LIMIT_MARGIN: usize = 64 * 1024;

/// Configure CORS from the configured origin list. Unparseable origins are
/// skipped.
pub fn configure_cors(config: &AppConfig) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

fn api_routes() -> Router<SharedState> {
    use routes::{account, auth, content, favourites, feedback, objects, tours};

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/account", get(account::me).delete(account::delete_account))
        .route("/api/account/password", post(account::change_password))
        .route("/api/account/promote", post(account::promote))
        .route("/api/account/badges/{badge_id}", post(account::add_badge_progress))
        .route("/api/account/profile-picture", post(account::choose_profile_picture))
        .route("/api/tours", get(tours::my_tours).post(tours::create_tour))
        .route("/api/tours/owned", get(tours::owned_tours))
        .route("/api/tours/{tour_id}", get(tours::get_tour))
        .route("/api/tours/{tour_id}/join", post(tours::join))
        .route("/api/tours/{tour_id}/members/{username}", delete(tours::remove_user))
        .route("/api/tours/{tour_id}/session", put(tours::update_session))
        .route("/api/tours/{tour_id}/review", post(tours::submit_review))
        .route("/api/tours/{tour_id}/objects", post(tours::add_object))
        .route(
            "/api/tours/{tour_id}/objects/{object_id}",
            delete(tours::remove_object),
        )
        .route(
            "/api/tours/{tour_id}/questions",
            get(tours::list_questions).post(tours::add_question),
        )
        .route(
            "/api/tours/{tour_id}/questions/{question_id}",
            delete(tours::remove_question),
        )
        .route("/api/tours/{tour_id}/checkpoints", get(tours::list_checkpoints))
        .route(
            "/api/tours/{tour_id}/feedback",
            get(tours::list_feedback).post(tours::submit_feedback),
        )
        .route("/api/tours/{tour_id}/answers", get(tours::my_answers))
        .route("/api/tours/{tour_id}/answers/{username}", get(tours::answers_by_user))
        .route("/api/questions", post(content::create_question))
        .route(
            "/api/questions/{question_id}/answers",
            get(content::answers_to_question),
        )
        .route("/api/answers", post(content::submit_answer))
        .route("/api/answers/multiple-choice", post(content::submit_mc_answer))
        .route("/api/checkpoints", post(content::create_checkpoint))
        .route("/api/checkpoints/object", post(content::create_object_checkpoint))
        .route("/api/checkpoints/picture", post(content::create_picture_checkpoint))
        .route("/api/feedback", post(feedback::send_feedback))
        .route("/api/favourites", get(favourites::get_favourites))
        .route(
            "/api/favourites/objects/{object_id}",
            post(favourites::add_object).delete(favourites::remove_object),
        )
        .route(
            "/api/favourites/tours/{tour_id}",
            post(favourites::add_tour).delete(favourites::remove_tour),
        )
        .route("/api/objects", get(objects::search))
        .route("/api/pictures/{picture_id}", get(objects::get_picture))
}

/// Create and configure the application router.
pub fn create_app(state: SharedState) -> Router {
    let cors = configure_cors(&state.config);
    tracing::info!(origins = state.config.allowed_origins.len(), "CORS configured");

    let body_limit = state.config.max_upload_bytes + BODY_LIMIT_MARGIN;

    api_routes()
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Pick the document store: Postgres when `DATABASE_URL` is set, otherwise an
/// in-process store that lives as long as the server.
async fn connect_store() -> Result<Db, sqlx::Error> {
    if std::env::var("DATABASE_URL").is_err() {
        tracing::warn!("DATABASE_URL not set. Using in-memory document store; data is not persisted.");
        return Ok(Db::in_memory());
    }

    let pool = db::init_pool(None).await?;
    let store = PgDocumentStore::new(pool);
    store.run_migrations().await?;
    Ok(Db::new(Arc::new(store)))
}

/// Load configuration, connect the store, seed reference data and serve until
/// the listener fails.
async fn serve() -> Result<(), String> {
    let config = AppConfig::from_env();
    config.validate()?;

    let db = connect_store()
        .await
        .map_err(|e| format!("failed to initialize document store: {}", e))?;

    if let Some(path) = &config.seed_file {
        let report = db::seed::load_file(&db, path)
            .await
            .map_err(|e| format!("failed to load seed file {}: {}", path.display(), e))?;
        tracing::info!(
            file = %path.display(),
            inserted = report.inserted,
            skipped = report.skipped,
            "Reference data loaded"
        );
    }

    let addr = format!("{}:{}", config.host, config.port);
    let app = create_app(Arc::new(AppState::new(db, config)));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("failed to bind to {}: {}", addr, e))?;
    tracing::info!("Starting server on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| format!("server error: {}", e))
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    // Dropping the guards stops the background log writers.
    let log_guards = logging::init(&logging::LogConfig::from_env());

    routes::health::init_start_time();

    if let Err(e) = serve().await {
        tracing::error!("Fatal: {}", e);
        drop(log_guards);
        std::process::exit(1);
    }
}

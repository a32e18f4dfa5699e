//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::rest::{events, sessions};
use super::sse::stream_handler;
use super::state::AppState;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - dashboards are served from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/events", post(events::publish_event))
        .route("/api/queue", get(events::queue_status))
        .route("/api/stream", get(stream_handler))
        .route("/api/sessions", get(sessions::list_sessions))
        .route("/api/sessions/:id", get(sessions::get_session))
        .route("/api/sessions/:id/start", post(sessions::start_session))
        .route("/api/sessions/:id/end", post(sessions::end_session))
        .route("/api/sessions/:id/milestones", get(sessions::list_milestones))
        .route(
            "/api/sessions/:id/milestones/achieved",
            get(sessions::list_achieved_milestones),
        )
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

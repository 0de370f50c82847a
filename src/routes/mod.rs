//! The axum router: session API, catalog and progress endpoints, the `/ws`
//! upgrade, and the static game frontend.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Every JSON route lives under `/api/v1`. Unknown paths fall through to
/// `./static`, and unknown files there serve `index.html` so client-side
/// routing keeps working. CORS is wide open; tighten it before exposing the
/// service beyond a classroom network.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/catalog", get(http::http_get_catalog))
        .route("/api/v1/modules/:module_id", get(http::http_get_module))
        .route(
            "/api/v1/progress/:module_id",
            get(http::http_get_progress).delete(http::http_delete_progress),
        )
        .route("/api/v1/sessions", post(http::http_post_session))
        .route(
            "/api/v1/sessions/:session_id",
            get(http::http_get_session).delete(http::http_delete_session),
        )
        .route("/api/v1/sessions/:session_id/select", post(http::http_post_select))
        .route("/api/v1/sessions/:session_id/submit", post(http::http_post_submit))
        .route("/api/v1/sessions/:session_id/advance", post(http::http_post_advance))
        .route("/api/v1/sessions/:session_id/continue", post(http::http_post_continue))
        .route("/api/v1/sessions/:session_id/restart", post(http::http_post_restart))
        .route("/api/v1/sessions/:session_id/explanation", get(http::http_get_explanation))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

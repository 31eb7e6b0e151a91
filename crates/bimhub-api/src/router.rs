//! Route definitions for the BimHub HTTP API.
//!
//! All routes are mounted under `/api`. The router receives `AppState` and
//! passes it to all handlers via Axum's `State` extractor.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.server.max_body_bytes;
    let cors = middleware::cors::build_cors_layer(&state.config.server.allowed_origins);

    let api_routes = Router::new()
        .merge(download_routes())
        .merge(health_routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Download submission, polling, cancellation and result retrieval
fn download_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/downloads",
            post(handlers::download::submit_download).get(handlers::download::list_downloads),
        )
        .route("/downloads/{ticket}", get(handlers::download::get_download))
        .route(
            "/downloads/{ticket}/cancel",
            post(handlers::download::cancel_download),
        )
        .route(
            "/downloads/{ticket}/data",
            get(handlers::download::download_data),
        )
}

/// Liveness and backend status
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

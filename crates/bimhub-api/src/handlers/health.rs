//! Health check handlers.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::dto::response::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    let deps = state.downloads.dependencies();
    let database = match deps.database.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            false
        }
    };
    let cached_results = deps.cache.len().await.unwrap_or_else(|e| {
        warn!(error = %e, "Cache size unavailable");
        0
    });
    let manager = state.downloads.manager();

    Json(ApiResponse::ok(DetailedHealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
        cached_results,
        tracked_downloads: manager.len(),
        active_downloads: manager.active(),
        plugins: deps.plugins.list().await,
    }))
}

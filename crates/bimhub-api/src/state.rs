//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use bimhub_core::config::AppConfig;
use bimhub_worker::DownloadService;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Download submission and tracking
    pub downloads: DownloadService,
    /// When the state was built
    pub started_at: Instant,
}

impl AppState {
    /// Creates the state.
    pub fn new(config: AppConfig, downloads: DownloadService) -> Self {
        Self {
            config: Arc::new(config),
            downloads,
            started_at: Instant::now(),
        }
    }
}

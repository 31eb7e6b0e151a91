//! Response DTOs.

use serde::{Deserialize, Serialize};

use bimhub_core::types::id::Ticket;
use bimhub_entity::action::LongActionState;
use bimhub_plugin::PluginInfo;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Returned when a download is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketResponse {
    /// Handle for polling and cancelling.
    pub ticket: Ticket,
}

/// State of one download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadStatusResponse {
    /// Download handle.
    pub ticket: Ticket,
    /// Lifecycle snapshot.
    #[serde(flatten)]
    pub state: LongActionState,
}

/// Outcome of a cancel request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Download handle.
    pub ticket: Ticket,
    /// Whether the request reached a download that was still running.
    pub cancelled: bool,
}

/// Basic health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" when serving.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Seconds since startup.
    pub uptime_seconds: u64,
}

/// Health check with backend details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Object database reachable.
    pub database: bool,
    /// Cached download results.
    pub cached_results: u64,
    /// Tracked downloads, finished ones included.
    pub tracked_downloads: usize,
    /// Downloads not yet finished.
    pub active_downloads: usize,
    /// Registered plugins.
    pub plugins: Vec<PluginInfo>,
}

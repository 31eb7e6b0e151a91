//! Long-running action worker configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the long-running action manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of actions allowed to execute concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-action time budget in seconds (0 disables the timeout).
    #[serde(default = "default_action_timeout")]
    pub action_timeout_seconds: u64,
    /// How long terminal actions stay pollable, in seconds.
    #[serde(default = "default_retention")]
    pub retention_seconds: u64,
    /// Interval between sweeps of expired terminal actions, in seconds.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            action_timeout_seconds: default_action_timeout(),
            retention_seconds: default_retention(),
            reaper_interval_seconds: default_reaper_interval(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_action_timeout() -> u64 {
    1800
}

fn default_retention() -> u64 {
    3600
}

fn default_reaper_interval() -> u64 {
    60
}

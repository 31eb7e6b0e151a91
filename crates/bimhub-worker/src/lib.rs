//! # bimhub-worker
//!
//! Long-running download actions. A submitted download becomes a
//! [`LongDownloadAction`] holding one [`DatabaseAction`] variant per
//! download mode; the [`LongActionManager`] hands out tickets, runs
//! actions on the tokio runtime and keeps their state pollable. The
//! [`DownloadService`] ties both to the result cache.

pub mod action;
pub mod manager;
pub mod service;

pub use action::database::DatabaseAction;
pub use action::download::{DownloadDependencies, LongDownloadAction, Requester};
pub use action::{ActionContext, LongAction};
pub use manager::LongActionManager;
pub use service::{DownloadRequest, DownloadResult, DownloadService};

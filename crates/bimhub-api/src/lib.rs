//! # bimhub-api
//!
//! HTTP API layer for BimHub built on Axum.
//!
//! Exposes download submission, polling, cancellation and result
//! retrieval, plus health endpoints, with CORS, compression, tracing and
//! request logging middleware.

pub mod app;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, build_state, run_server};
pub use error::ApiError;
pub use state::AppState;

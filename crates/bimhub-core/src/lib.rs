//! # bimhub-core
//!
//! Core crate for BimHub. Contains configuration schemas, typed
//! identifiers for store records and long-running actions, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other BimHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;

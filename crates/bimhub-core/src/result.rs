//! Convenience result type alias for BimHub.

use crate::error::AppError;

/// A specialized `Result` type for BimHub operations.
pub type AppResult<T> = Result<T, AppError>;

//! Convenience result type alias for ProdKit.

use crate::error::AppError;

/// A specialized `Result` type for ProdKit operations.
pub type AppResult<T> = Result<T, AppError>;

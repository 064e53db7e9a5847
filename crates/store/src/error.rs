//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use timekeeper_model::{ScanId, ScanResultId};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The scan does not exist (anymore).
    #[display("scan not found: {_0}")]
    ScanNotFound(#[error(not(source))] ScanId),
    /// The scan result does not exist (anymore).
    #[display("scan result not found: {_0}")]
    ResultNotFound(#[error(not(source))] ScanResultId),
    /// Stored data could not be converted to or from the model.
    #[display("invalid stored data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if the error means the targeted record is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ScanNotFound(_) | Self::ResultNotFound(_))
    }
}

//! Lifecycle Error Types
//!
//! Only creation and user-facing lookups raise errors. Sweeps absorb every
//! failure into their report; see [`SweepReport`](crate::sweep::SweepReport).

use derive_more::{Display, Error};
use timekeeper_model::{ScanId, ScanResultId};

/// A lifecycle error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The user already requested this URL within the dedupe window. Carries
    /// the existing scan. Not worth retrying until the window has passed.
    #[display("duplicate scan request (existing scan {_0})")]
    DuplicateRequest(#[error(not(source))] ScanId),
    /// The scan does not exist, or it belongs to someone else.
    #[display("scan not found: {_0}")]
    ScanNotFound(#[error(not(source))] ScanId),
    #[display("scan result not found: {_0}")]
    ResultNotFound(#[error(not(source))] ScanResultId),
    #[display("invalid page request")]
    InvalidPage,
    #[display("scan store error")]
    Store,
}

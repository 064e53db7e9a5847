//! Provider Error Types
//!
//! Responses from the provider (including 4xx/5xx) are classified into
//! outcomes, not errors. Errors here mean no usable response was received.

use derive_more::{Display, Error};

/// A provider error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The HTTP client could not be built from the given options.
    #[display("invalid provider client configuration: {_0}")]
    Client(#[error(not(source))] &'static str),
    /// The request never produced a response (connect failure, timeout, ...).
    #[display("provider request failed")]
    Transport,
}

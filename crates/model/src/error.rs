//! Model Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A model error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A textual value could not be parsed into its model type.
    #[display("unable to parse {field}: {value}")]
    ParseError { field: &'static str, value: String },
    /// Pagination parameters were out of range. Fix the request.
    #[display("invalid page request: {_0}")]
    InvalidPage(#[error(not(source))] &'static str),
    /// Persisted fields violate a scan result invariant.
    #[display("inconsistent scan result: {_0}")]
    Inconsistent(#[error(not(source))] &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        let err = ErrorKind::ParseError {
            field: "status",
            value: "PENDING".to_string(),
        };
        assert_eq!(err.to_string(), "unable to parse status: PENDING");
        assert_eq!(
            ErrorKind::InvalidPage("page size must be greater than zero").to_string(),
            "invalid page request: page size must be greater than zero"
        );
    }
}

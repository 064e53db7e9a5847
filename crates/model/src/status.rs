use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Lifecycle status of a [`ScanResult`](crate::ScanResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Requested by a user but not yet handed to the scanning provider.
    Submitted,
    /// Accepted by the provider; waiting for the report to become ready.
    Processing,
    /// The provider finished scanning and the report is available.
    Done,
    /// The provider rejected the scan. Failure details are always present.
    Failed,
}
impl Status {
    pub const ALL: [Status; 4] = [Self::Submitted, Self::Processing, Self::Done, Self::Failed];

    /// Returns the canonical (persisted) name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Processing => "PROCESSING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}
impl FromStr for Status {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" => Self::Submitted,
            "PROCESSING" => Self::Processing,
            "DONE" => Self::Done,
            "FAILED" => Self::Failed,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "status",
                value: s.to_string(),
            }),
        })
    }
}
impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("SUBMITTED", Status::Submitted)]
    #[case("processing", Status::Processing)]
    #[case(" Done ", Status::Done)]
    #[case("FAILED", Status::Failed)]
    fn test_parse(#[case] input: &str, #[case] expected: Status) {
        assert_eq!(input.parse::<Status>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "PENDING".parse::<Status>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "status", .. }));
    }

    #[test]
    fn test_display_matches_parse() {
        for status in Status::ALL {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
    }
}

use crate::{FailureDetails, ScanId, ScanResult, Status};
use time::UtcDateTime;

/// A user's request to scan a URL.
///
/// Immutable once created; the referenced [`ScanResult`] is the part that
/// moves through the lifecycle, and it may be shared with other users' scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub id: ScanId,
    pub user_id: String,
    pub result: ScanResult,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}
impl Scan {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Listing view of a [`Scan`] without the provider-specific result fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub id: ScanId,
    pub url: String,
    pub status: Status,
    /// Present only when `status` is [`Failed`](Status::Failed).
    pub failure: Option<FailureDetails>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}
impl From<&Scan> for ScanSummary {
    fn from(scan: &Scan) -> Self {
        Self {
            id: scan.id,
            url: scan.result.url().to_string(),
            status: scan.result.status(),
            failure: scan.result.failure().cloned(),
            created_at: scan.created_at,
            updated_at: scan.updated_at,
        }
    }
}
impl From<Scan> for ScanSummary {
    fn from(scan: Scan) -> Self {
        Self::from(&scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScanResultId, Transition};

    #[test]
    fn test_summary_from_failed_scan() {
        let created = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let mut result = ScanResult::submitted(ScanResultId::from(7), "https://example.com", created);
        result.apply(
            &Transition::Failed(FailureDetails::new(400, Some("bad".to_string()), None)),
            created,
        );
        let scan = Scan {
            id: ScanId::from(3),
            user_id: "alice".to_string(),
            result,
            created_at: created,
            updated_at: created,
        };
        let summary = ScanSummary::from(&scan);
        assert_eq!(summary.id, ScanId::from(3));
        assert_eq!(summary.url, "https://example.com");
        assert_eq!(summary.status, Status::Failed);
        assert_eq!(summary.failure.map(|f| f.code), Some(400));
        assert!(scan.is_owned_by("alice"));
        assert!(!scan.is_owned_by("bob"));
    }
}

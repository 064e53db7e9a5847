use crate::{Scan, ScanId, ScanResult, ScanResultId};
use time::{Duration, UtcDateTime};

/// What creating a scan for a (user, URL) pair should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The user already has a recent scan for the URL.
    Duplicate(ScanId),
    /// Someone requested the URL recently; point the new scan at that result.
    Reuse(ScanResultId),
    /// Nothing recent; a new result has to be submitted.
    Fresh,
}

/// The trailing window in which repeated requests for a URL are deduplicated.
///
/// Stores look up the latest scan and result after [`cutoff`](Self::cutoff)
/// and hand both to [`decide`](Self::decide) while still holding their write
/// lock, so the decision and the insert it leads to are atomic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupPolicy {
    window: Duration,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self { window: Duration::DAY }
    }
}

impl DedupPolicy {
    pub fn new(window: std::time::Duration) -> Self {
        Self {
            window: Duration::try_from(window).unwrap_or(Duration::MAX),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start of the window ending at `now`.
    pub fn cutoff(&self, now: UtcDateTime) -> UtcDateTime {
        now.checked_sub(self.window).unwrap_or(UtcDateTime::MIN)
    }

    /// Whether something created at `created_at` falls inside the window that
    /// starts at `cutoff`. The boundary itself is outside.
    pub fn is_within_window(created_at: UtcDateTime, cutoff: UtcDateTime) -> bool {
        created_at > cutoff
    }

    /// Decide how a scan requested at `now` is created, given the user's latest
    /// scan for the URL and the latest result for the URL (by anyone).
    pub fn decide(&self, own: Option<&Scan>, shared: Option<&ScanResult>, now: UtcDateTime) -> Decision {
        let cutoff = self.cutoff(now);
        if let Some(scan) = own.filter(|scan| Self::is_within_window(scan.created_at, cutoff)) {
            return Decision::Duplicate(scan.id);
        }
        if let Some(result) = shared.filter(|result| Self::is_within_window(result.created_at(), cutoff)) {
            return Decision::Reuse(result.id());
        }
        Decision::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const URL: &str = "https://example.com";

    fn at(seconds: i64) -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_700_000_000 + seconds).unwrap()
    }

    fn scan(created_at: UtcDateTime) -> Scan {
        Scan {
            id: ScanId::from(1),
            user_id: "alice".to_string(),
            result: ScanResult::submitted(ScanResultId::from(2), URL, created_at),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_default_window_is_one_day() {
        assert_eq!(DedupPolicy::default().window(), Duration::days(1));
        assert_eq!(DedupPolicy::new(std::time::Duration::from_secs(86_400)), DedupPolicy::default());
    }

    #[rstest]
    #[case(-1, false)]
    #[case(0, false)]
    #[case(1, true)]
    #[case(86_400, true)]
    fn test_is_within_window(#[case] offset: i64, #[case] expected: bool) {
        let cutoff = at(0);
        assert_eq!(DedupPolicy::is_within_window(at(offset), cutoff), expected);
    }

    #[test]
    fn test_cutoff() {
        let policy = DedupPolicy::default();
        assert_eq!(policy.cutoff(at(86_400)), at(0));
        assert_eq!(policy.cutoff(UtcDateTime::MIN), UtcDateTime::MIN);
    }

    #[test]
    fn test_decisions() {
        let policy = DedupPolicy::default();
        let own = scan(at(0));
        assert_eq!(policy.decide(None, None, at(0)), Decision::Fresh);
        assert_eq!(
            policy.decide(Some(&own), Some(&own.result), at(60)),
            Decision::Duplicate(ScanId::from(1))
        );
        assert_eq!(
            policy.decide(None, Some(&own.result), at(60)),
            Decision::Reuse(ScanResultId::from(2))
        );
        // Exactly one window later both records sit on the boundary.
        assert_eq!(policy.decide(Some(&own), Some(&own.result), at(86_400)), Decision::Fresh);
    }
}

//! Periodic sweeps that move scan results through the lifecycle.
//!
//! Both sweeps share one engine ([`Sweeper`]) and differ only in their
//! [`Stage`]: which status they pick up, which provider call they make and
//! how they read the answer.

mod engine;
mod status;
mod submission;

pub use self::engine::{SweepOutcome, SweepReport, Sweeper};
pub use self::status::StatusStage;
pub use self::submission::SubmissionStage;
use async_trait::async_trait;
use std::fmt::Debug;
use time::{Duration, UtcDateTime};
use timekeeper_model::{MAX_PAGE_SIZE, ScanResult, Status, Transition};

/// Results fetched per page during a sweep.
pub const SWEEP_PAGE_SIZE: u32 = MAX_PAGE_SIZE;

/// What a stage decided to do with one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Persist this transition.
    Transition(Transition),
    /// The provider is rate limiting us; stop the sweep and stay away until then.
    Throttle(UtcDateTime),
    /// Leave the result as it is; it will be picked up again next sweep.
    Defer,
}

/// One kind of sweep.
#[async_trait]
pub trait Stage: Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Status of the results this stage works on.
    fn status(&self) -> Status;

    /// Talk to the provider about `result` and decide what to do with it.
    ///
    /// Must not fail: anything unexpected is a [`Defer`](Action::Defer).
    async fn process(&self, result: &ScanResult, now: UtcDateTime) -> Action;
}

/// Deadline for a throttle signal, falling back to `now + fallback` when the
/// provider didn't say when to come back.
pub(crate) fn throttle_deadline(reset_at: Option<UtcDateTime>, now: UtcDateTime, fallback: Duration) -> UtcDateTime {
    reset_at.unwrap_or_else(|| now.checked_add(fallback).unwrap_or(UtcDateTime::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_deadline() {
        let now = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let reset = now + Duration::seconds(5);
        assert_eq!(throttle_deadline(Some(reset), now, Duration::MINUTE), reset);
        assert_eq!(throttle_deadline(None, now, Duration::MINUTE), now + Duration::MINUTE);
        assert_eq!(throttle_deadline(None, UtcDateTime::MAX, Duration::MINUTE), UtcDateTime::MAX);
    }
}

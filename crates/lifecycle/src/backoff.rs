use std::sync::{Mutex, PoisonError};
use time::UtcDateTime;

/// "Do not resume before" deadline shared by every run of one sweeper.
///
/// The deadline only ever moves forward: [`advance_to`](Self::advance_to)
/// keeps the latest deadline it has seen, so late or out-of-order throttle
/// signals can't shorten a backoff.
#[derive(Debug, Default)]
pub struct BackoffGate {
    deadline: Mutex<Option<UtcDateTime>>,
}

impl BackoffGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<UtcDateTime> {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the deadline to `candidate`, unless the current deadline is
    /// already later. Returns whether the stored deadline is now `candidate`.
    pub fn advance_to(&self, candidate: UtcDateTime) -> bool {
        // A panic while holding the lock can't leave a half-written Option.
        let mut deadline = self.deadline.lock().unwrap_or_else(PoisonError::into_inner);
        match *deadline {
            Some(existing) if existing > candidate => false,
            _ => {
                *deadline = Some(candidate);
                true
            },
        }
    }

    /// Whether a sweep may run at `now`.
    pub fn is_open(&self, now: UtcDateTime) -> bool {
        self.get().is_none_or(|deadline| deadline <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;

    fn at(seconds: i64) -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_700_000_000 + seconds).unwrap()
    }

    #[test]
    fn test_starts_open() {
        let gate = BackoffGate::new();
        assert_eq!(gate.get(), None);
        assert!(gate.is_open(at(0)));
    }

    #[rstest]
    #[case(&[10], 10)]
    #[case(&[10, 5], 10)]
    #[case(&[5, 10], 10)]
    #[case(&[3, 30, 7, 30, 12], 30)]
    #[case(&[-5, -10], -5)]
    fn test_keeps_the_maximum(#[case] candidates: &[i64], #[case] expected: i64) {
        let gate = BackoffGate::new();
        for candidate in candidates {
            gate.advance_to(at(*candidate));
        }
        assert_eq!(gate.get(), Some(at(expected)));
    }

    #[test]
    fn test_advance_reports_change() {
        let gate = BackoffGate::new();
        assert!(gate.advance_to(at(10)));
        assert!(gate.advance_to(at(10)));
        assert!(!gate.advance_to(at(9)));
        assert!(gate.advance_to(at(11)));
    }

    #[test]
    fn test_is_open_at_deadline() {
        let gate = BackoffGate::new();
        gate.advance_to(at(10));
        assert!(!gate.is_open(at(9)));
        assert!(gate.is_open(at(10)));
        assert!(gate.is_open(at(11)));
    }

    #[test]
    fn test_concurrent_advances() {
        let gate = Arc::new(BackoffGate::new());
        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        gate.advance_to(at((i * 8 + thread) % 500));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(gate.get(), Some(at(499)));
    }
}

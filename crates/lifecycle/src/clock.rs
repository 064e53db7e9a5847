use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use time::{Duration, UtcDateTime};

pub type ClockHandle = Arc<dyn Clock>;

/// Source of the current time.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> UtcDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;
impl Clock for SystemClock {
    fn now(&self) -> UtcDateTime {
        UtcDateTime::now()
    }
}

/// A clock that only moves when told to.
///
/// Not gated behind `#[cfg(test)]` so that other crates can use it in their
/// tests too.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<UtcDateTime>,
}
impl ManualClock {
    pub fn new(now: UtcDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: UtcDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}
impl Clock for ManualClock {
    fn now(&self) -> UtcDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! The scan lifecycle.
//!
//! - [`ScanService`] creates scans (deduplicated per user and URL within a
//!   trailing window, reusing other users' recent results) and serves the
//!   user-facing lookups.
//! - Two sweeps move results forward: the [`SubmissionStage`] sends
//!   `SUBMITTED` results to the provider, the [`StatusStage`] polls the
//!   provider for `PROCESSING` ones. Both run on the same [`Sweeper`] engine.
//! - Each sweeper has its own [`BackoffGate`]; a throttle signal from the
//!   provider closes the gate and ends the sweep.
//! - [`spawn_sweeper`] runs a sweeper on a fixed delay until shut down.

mod backoff;
mod clock;
pub mod error;
mod schedule;
mod service;
pub mod sweep;

pub use crate::backoff::BackoffGate;
pub use crate::clock::{Clock, ClockHandle, ManualClock, SystemClock};
pub use crate::schedule::{Ticker, run_periodically, spawn_sweeper};
pub use crate::service::ScanService;
pub use crate::sweep::{StatusStage, SubmissionStage, SweepOutcome, SweepReport, Sweeper};
pub use timekeeper_model::DedupPolicy;

//! Domain model for scan tracking.
//!
//! A [`Scan`] is one user's request to scan a URL. It always points at exactly
//! one [`ScanResult`], which is the unit of work sent to the external scanning
//! provider. Several scans (from different users) may share the same result
//! when a recent result for the same URL is reused.
//!
//! # Lifecycle
//! ```text
//! SUBMITTED ──submit ok──▶ PROCESSING ──result ready──▶ DONE
//!     │                        │
//!     └──────client error──────┴──────client error──────▶ FAILED
//! ```
//! Results only ever change through [`ScanResult::apply`], which is where the
//! "failure details iff FAILED" rule is enforced.
//!
//! [`DedupPolicy`] decides whether a new request for a URL is a duplicate,
//! can reuse a recent result, or needs a fresh one.

mod dedup;
pub mod error;
mod id;
mod page;
mod result;
mod scan;
mod status;

pub use crate::dedup::{Decision, DedupPolicy};
pub use crate::id::{ScanId, ScanResultId};
pub use crate::page::{MAX_PAGE_SIZE, Page, PageRequest};
pub use crate::result::{FailureDetails, ScanResult, ScanResultParts, Transition};
pub use crate::scan::{Scan, ScanSummary};
pub use crate::status::Status;

//! The external URL scanning provider.
//!
//! The lifecycle talks to the provider through [`ScanProvider`], which turns
//! every response into an outcome the sweeps can act on:
//! - 200: accepted / ready;
//! - 429: throttled until the time in the `X-Rate-Limit-Reset` header;
//! - 404 with the exact message `Scan is not finished yet`: still in progress
//!   (lookups only);
//! - any other 4xx: rejected, with the failure details from the body;
//! - anything else: unavailable, try again later.
//!
//! An `Err` means no response was received at all.

mod client;
pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod outcome;

pub use crate::client::{ClientOptions, DEFAULT_API_KEY_HEADER, DEFAULT_TIMEOUT, UrlScanClient, Visibility};
#[cfg(feature = "mock")]
pub use crate::mock::{MockProvider, ProviderCall};
pub use crate::outcome::{IN_PROGRESS_MESSAGE, RATE_LIMIT_RESET_HEADER, RawResponse, ResultOutcome, SubmitOutcome};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

pub type ProviderHandle = Arc<dyn ScanProvider>;

/// Remote scanning API.
#[async_trait]
pub trait ScanProvider: Debug + Send + Sync {
    /// Ask the provider to scan `url`.
    async fn submit(&self, url: &str) -> Result<SubmitOutcome>;

    /// Look up a scan previously accepted under `external_id`.
    async fn get_result(&self, external_id: &str) -> Result<ResultOutcome>;
}

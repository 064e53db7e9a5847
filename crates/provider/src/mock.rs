//! Scripted provider for testing.

use crate::error::{ErrorKind, Result};
use crate::{ResultOutcome, ScanProvider, SubmitOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A call received by a [`MockProvider`], in the order received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Submit(String),
    GetResult(String),
}

/// In-memory [`ScanProvider`] that replays scripted outcomes.
///
/// Submissions are scripted per URL and lookups per external ID. A script
/// of `None` simulates a transport failure. Anything not scripted answers
/// with [`Unavailable`](SubmitOutcome::Unavailable).
///
/// # Examples
///
/// ```
/// use timekeeper_provider::{MockProvider, ScanProvider, SubmitOutcome};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let provider = MockProvider::default();
/// provider.on_submit("https://example.com", SubmitOutcome::Throttled { reset_at: None }).await;
/// let outcome = provider.submit("https://example.com").await.unwrap();
/// assert_eq!(outcome, SubmitOutcome::Throttled { reset_at: None });
/// assert_eq!(provider.calls().await.len(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockProvider {
    submissions: RwLock<HashMap<String, Option<SubmitOutcome>>>,
    results: RwLock<HashMap<String, Option<ResultOutcome>>>,
    calls: RwLock<Vec<ProviderCall>>,
}

impl MockProvider {
    pub async fn on_submit(&self, url: impl Into<String>, outcome: SubmitOutcome) {
        self.submissions.write().await.insert(url.into(), Some(outcome));
    }

    pub async fn on_get_result(&self, external_id: impl Into<String>, outcome: ResultOutcome) {
        self.results.write().await.insert(external_id.into(), Some(outcome));
    }

    /// Make submitting `url` fail without a response.
    pub async fn fail_submit(&self, url: impl Into<String>) {
        self.submissions.write().await.insert(url.into(), None);
    }

    /// Make looking up `external_id` fail without a response.
    pub async fn fail_get_result(&self, external_id: impl Into<String>) {
        self.results.write().await.insert(external_id.into(), None);
    }

    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl ScanProvider for MockProvider {
    async fn submit(&self, url: &str) -> Result<SubmitOutcome> {
        self.calls.write().await.push(ProviderCall::Submit(url.to_string()));
        match self.submissions.read().await.get(url) {
            Some(Some(outcome)) => Ok(outcome.clone()),
            Some(None) => exn::bail!(ErrorKind::Transport),
            None => Ok(SubmitOutcome::Unavailable { status: None }),
        }
    }

    async fn get_result(&self, external_id: &str) -> Result<ResultOutcome> {
        self.calls.write().await.push(ProviderCall::GetResult(external_id.to_string()));
        match self.results.read().await.get(external_id) {
            Some(Some(outcome)) => Ok(outcome.clone()),
            Some(None) => exn::bail!(ErrorKind::Transport),
            None => Ok(ResultOutcome::Unavailable { status: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_is_unavailable() {
        let provider = MockProvider::default();
        assert_eq!(provider.get_result("abc").await.unwrap(), ResultOutcome::Unavailable { status: None });
        assert_eq!(provider.calls().await, vec![ProviderCall::GetResult("abc".to_string())]);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let provider = MockProvider::default();
        provider.fail_submit("https://example.com").await;
        let err = provider.submit("https://example.com").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Transport));
    }
}

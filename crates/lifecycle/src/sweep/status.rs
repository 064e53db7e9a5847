use super::{Action, Stage, throttle_deadline};
use async_trait::async_trait;
use time::{Duration, UtcDateTime};
use timekeeper_model::{ScanResult, Status, Transition};
use timekeeper_provider::{ProviderHandle, ResultOutcome};

/// Polls the provider for `PROCESSING` results.
#[derive(Debug)]
pub struct StatusStage {
    provider: ProviderHandle,
    fallback_backoff: Duration,
}

impl StatusStage {
    pub fn new(provider: ProviderHandle, fallback_backoff: std::time::Duration) -> Self {
        Self {
            provider,
            fallback_backoff: Duration::try_from(fallback_backoff).unwrap_or(Duration::MAX),
        }
    }

    pub fn interpret(outcome: ResultOutcome, now: UtcDateTime, fallback_backoff: Duration) -> Action {
        match outcome {
            ResultOutcome::Ready => Action::Transition(Transition::Done),
            ResultOutcome::InProgress => Action::Defer,
            ResultOutcome::Throttled { reset_at } => Action::Throttle(throttle_deadline(reset_at, now, fallback_backoff)),
            ResultOutcome::Rejected(details) => Action::Transition(Transition::Failed(details)),
            ResultOutcome::Unavailable { .. } => Action::Defer,
        }
    }
}

#[async_trait]
impl Stage for StatusStage {
    fn name(&self) -> &'static str {
        "status"
    }

    fn status(&self) -> Status {
        Status::Processing
    }

    async fn process(&self, result: &ScanResult, now: UtcDateTime) -> Action {
        let Some(external_id) = result.external_id() else {
            tracing::warn!(result_id = %result.id(), "Processing scan result has no external scan ID, skipping");
            return Action::Defer;
        };
        match self.provider.get_result(external_id).await {
            Ok(outcome) => {
                match &outcome {
                    ResultOutcome::InProgress => {
                        tracing::debug!(result_id = %result.id(), external_id, "Scan still in progress");
                    },
                    ResultOutcome::Unavailable { status } => {
                        tracing::warn!(result_id = %result.id(), status = ?status, "Provider unavailable, will retry");
                    },
                    _ => {},
                }
                Self::interpret(outcome, now, self.fallback_backoff)
            },
            Err(err) => {
                tracing::warn!(result_id = %result.id(), error = ?err, "Result lookup failed, will retry");
                Action::Defer
            },
        }
    }
}

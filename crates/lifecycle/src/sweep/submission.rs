use super::{Action, Stage, throttle_deadline};
use async_trait::async_trait;
use time::{Duration, UtcDateTime};
use timekeeper_model::{ScanResult, Status, Transition};
use timekeeper_provider::{ProviderHandle, SubmitOutcome};

/// Sends `SUBMITTED` results to the provider.
#[derive(Debug)]
pub struct SubmissionStage {
    provider: ProviderHandle,
    fallback_backoff: Duration,
}

impl SubmissionStage {
    pub fn new(provider: ProviderHandle, fallback_backoff: std::time::Duration) -> Self {
        Self {
            provider,
            fallback_backoff: Duration::try_from(fallback_backoff).unwrap_or(Duration::MAX),
        }
    }

    pub fn interpret(outcome: SubmitOutcome, now: UtcDateTime, fallback_backoff: Duration) -> Action {
        match outcome {
            SubmitOutcome::Accepted {
                external_id,
                result_location,
            } => Action::Transition(Transition::Processing {
                external_id,
                result_location,
            }),
            SubmitOutcome::Throttled { reset_at } => Action::Throttle(throttle_deadline(reset_at, now, fallback_backoff)),
            SubmitOutcome::Rejected(details) => Action::Transition(Transition::Failed(details)),
            SubmitOutcome::Unavailable { .. } => Action::Defer,
        }
    }
}

#[async_trait]
impl Stage for SubmissionStage {
    fn name(&self) -> &'static str {
        "submission"
    }

    fn status(&self) -> Status {
        Status::Submitted
    }

    async fn process(&self, result: &ScanResult, now: UtcDateTime) -> Action {
        match self.provider.submit(result.url()).await {
            Ok(outcome) => {
                if let SubmitOutcome::Unavailable { status } = &outcome {
                    tracing::warn!(result_id = %result.id(), status = ?status, "Provider unavailable, will retry");
                }
                Self::interpret(outcome, now, self.fallback_backoff)
            },
            Err(err) => {
                tracing::warn!(result_id = %result.id(), error = ?err, "Submission failed, will retry");
                Action::Defer
            },
        }
    }
}

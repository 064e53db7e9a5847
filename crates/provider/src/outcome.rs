//! Classification of raw provider responses.
//!
//! Kept free of any HTTP client types so that every branch can be tested
//! without a server.

use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcDateTime};
use timekeeper_model::FailureDetails;

/// Message the provider sends (with a 404) while a scan is still running.
///
/// Matched exactly; any other 404 is a client error.
pub const IN_PROGRESS_MESSAGE: &str = "Scan is not finished yet";
/// Header carrying the absolute time at which the rate limit resets.
pub const RATE_LIMIT_RESET_HEADER: &str = "X-Rate-Limit-Reset";

const HTTP_OK: u16 = 200;
const HTTP_NOT_FOUND: u16 = 404;
const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Result of asking the provider to scan a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The provider accepted the URL and assigned it an ID.
    Accepted {
        external_id: String,
        result_location: Option<String>,
    },
    /// Rate limited. `reset_at` is absent if the provider didn't say (or said
    /// something unreadable).
    Throttled { reset_at: Option<UtcDateTime> },
    /// The provider refused the request; retrying will not help.
    Rejected(FailureDetails),
    /// Anything else. Worth retrying later.
    Unavailable { status: Option<u16> },
}

/// Result of asking the provider for a previously submitted scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultOutcome {
    Ready,
    InProgress,
    Throttled { reset_at: Option<UtcDateTime> },
    Rejected(FailureDetails),
    Unavailable { status: Option<u16> },
}

/// Just enough of an HTTP response to classify it.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    /// Value of the [`RATE_LIMIT_RESET_HEADER`] header, if any.
    pub rate_limit_reset: Option<String>,
    pub body: Vec<u8>,
}

/// Body of a provider response. Success and error bodies share one shape
/// because the provider mixes them freely; every field is optional.
#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
    uuid: Option<String>,
    result: Option<String>,
    message: Option<String>,
    description: Option<String>,
    status: Option<i32>,
}
impl ResponseBody {
    fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(parsed) => parsed,
            Err(err) => {
                if !body.is_empty() {
                    tracing::debug!(error = %err, "Unreadable provider response body");
                }
                Self::default()
            },
        }
    }

    fn failure(self, http_status: u16) -> FailureDetails {
        FailureDetails::new(
            self.status.unwrap_or(i32::from(http_status)),
            self.message,
            self.description,
        )
    }
}

/// Parse the rate limit reset header as an RFC 3339 timestamp.
pub fn parse_reset(value: Option<&str>) -> Option<UtcDateTime> {
    let value = value?.trim();
    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(at) => Some(at.to_utc()),
        Err(err) => {
            tracing::warn!(header = RATE_LIMIT_RESET_HEADER, value, error = %err, "Unparseable rate limit reset");
            None
        },
    }
}

fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status)
}

impl RawResponse {
    /// Classify the response to a submission.
    pub fn into_submit_outcome(self) -> SubmitOutcome {
        match self.status {
            HTTP_OK => {
                let body = ResponseBody::parse(&self.body);
                match body.uuid.filter(|id| !id.is_empty()) {
                    Some(external_id) => SubmitOutcome::Accepted {
                        external_id,
                        result_location: body.result,
                    },
                    None => {
                        tracing::warn!("Provider accepted a submission without returning a scan ID");
                        SubmitOutcome::Unavailable { status: Some(self.status) }
                    },
                }
            },
            HTTP_TOO_MANY_REQUESTS => SubmitOutcome::Throttled {
                reset_at: parse_reset(self.rate_limit_reset.as_deref()),
            },
            status if is_client_error(status) => SubmitOutcome::Rejected(ResponseBody::parse(&self.body).failure(status)),
            status => SubmitOutcome::Unavailable { status: Some(status) },
        }
    }

    /// Classify the response to a result lookup.
    pub fn into_result_outcome(self) -> ResultOutcome {
        match self.status {
            HTTP_OK => ResultOutcome::Ready,
            HTTP_TOO_MANY_REQUESTS => ResultOutcome::Throttled {
                reset_at: parse_reset(self.rate_limit_reset.as_deref()),
            },
            status if is_client_error(status) => {
                let body = ResponseBody::parse(&self.body);
                if status == HTTP_NOT_FOUND && body.message.as_deref() == Some(IN_PROGRESS_MESSAGE) {
                    ResultOutcome::InProgress
                } else {
                    ResultOutcome::Rejected(body.failure(status))
                }
            },
            status => ResultOutcome::Unavailable { status: Some(status) },
        }
    }
}

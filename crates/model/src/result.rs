use crate::error::{Error, ErrorKind};
use crate::{ScanResultId, Status};
use std::fmt::{Display, Formatter, Result as FmtResult};
use time::UtcDateTime;

/// Why the scanning provider rejected a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetails {
    /// Error code reported by the provider (falls back to the HTTP status).
    pub code: i32,
    /// Short message about the failure.
    pub message: Option<String>,
    /// Longer, human-readable description of the failure.
    pub description: Option<String>,
}
impl FailureDetails {
    pub fn new(code: i32, message: Option<String>, description: Option<String>) -> Self {
        Self { code, message, description }
    }
}
impl Display for FailureDetails {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.code, message),
            None => write!(f, "{}", self.code),
        }
    }
}

/// A state change of a [`ScanResult`], as decided by one of the sweeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The provider accepted the submission.
    Processing {
        external_id: String,
        result_location: Option<String>,
    },
    /// The provider finished the scan.
    Done,
    /// The provider rejected the scan.
    Failed(FailureDetails),
}
impl Transition {
    /// Status the result ends up in after this transition.
    pub fn status(&self) -> Status {
        match self {
            Self::Processing { .. } => Status::Processing,
            Self::Done => Status::Done,
            Self::Failed(_) => Status::Failed,
        }
    }
}

/// Raw fields of a persisted scan result, before invariants are checked.
///
/// Storage implementations fill this in from whatever they persist and turn
/// it into a [`ScanResult`] with [`TryFrom`].
#[derive(Debug, Clone)]
pub struct ScanResultParts {
    pub id: ScanResultId,
    pub url: String,
    pub status: Status,
    pub external_id: Option<String>,
    pub result_location: Option<String>,
    pub failure: Option<FailureDetails>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// The unit of external scanning work for one URL.
///
/// Fields are read-only from the outside; the only way to change a result is
/// [`apply`](Self::apply), which keeps these invariants:
/// - failure details are present if and only if the status is
///   [`Failed`](Status::Failed);
/// - the external scan ID and result location, once set, are never cleared;
/// - `updated_at` never goes backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    id: ScanResultId,
    url: String,
    status: Status,
    external_id: Option<String>,
    result_location: Option<String>,
    failure: Option<FailureDetails>,
    created_at: UtcDateTime,
    updated_at: UtcDateTime,
}
impl ScanResult {
    /// A freshly requested result that has not been sent to the provider yet.
    pub fn submitted(id: ScanResultId, url: impl Into<String>, now: UtcDateTime) -> Self {
        Self {
            id,
            url: url.into(),
            status: Status::Submitted,
            external_id: None,
            result_location: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> ScanResultId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Identifier assigned by the scanning provider on submission.
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    /// Where the provider publishes the report for this scan.
    pub fn result_location(&self) -> Option<&str> {
        self.result_location.as_deref()
    }

    pub fn failure(&self) -> Option<&FailureDetails> {
        self.failure.as_ref()
    }

    pub fn created_at(&self) -> UtcDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> UtcDateTime {
        self.updated_at
    }

    /// Apply a transition decided by a sweep.
    pub fn apply(&mut self, transition: &Transition, now: UtcDateTime) {
        match transition {
            Transition::Processing { external_id, result_location } => {
                self.external_id = Some(external_id.clone());
                if let Some(location) = result_location {
                    self.result_location = Some(location.clone());
                }
                self.failure = None;
            },
            Transition::Done => self.failure = None,
            Transition::Failed(details) => self.failure = Some(details.clone()),
        }
        self.status = transition.status();
        self.updated_at = self.updated_at.max(now);
    }
}
impl TryFrom<ScanResultParts> for ScanResult {
    type Error = Error;
    fn try_from(parts: ScanResultParts) -> Result<Self, Self::Error> {
        match (parts.status, &parts.failure) {
            (Status::Failed, None) => exn::bail!(ErrorKind::Inconsistent("failed without failure details")),
            (status, Some(_)) if status != Status::Failed => {
                exn::bail!(ErrorKind::Inconsistent("failure details on a result that has not failed"))
            },
            _ => {},
        }
        if parts.updated_at < parts.created_at {
            exn::bail!(ErrorKind::Inconsistent("updated before it was created"));
        }
        Ok(Self {
            id: parts.id,
            url: parts.url,
            status: parts.status,
            external_id: parts.external_id,
            result_location: parts.result_location,
            failure: parts.failure,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }
}
impl From<ScanResult> for ScanResultParts {
    fn from(result: ScanResult) -> Self {
        Self {
            id: result.id,
            url: result.url,
            status: result.status,
            external_id: result.external_id,
            result_location: result.result_location,
            failure: result.failure,
            created_at: result.created_at,
            updated_at: result.updated_at,
        }
    }
}

use super::{from_millis, to_millis};
use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use timekeeper_model::{FailureDetails, ScanResult, ScanResultId, ScanResultParts, Status};

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ScanResultRow {
    pub(crate) id: i64,
    pub(crate) url: String,
    pub(crate) status: String,
    pub(crate) external_id: Option<String>,
    pub(crate) result_location: Option<String>,
    pub(crate) failure_code: Option<i32>,
    pub(crate) failure_message: Option<String>,
    pub(crate) failure_description: Option<String>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}
impl From<&ScanResult> for ScanResultRow {
    fn from(result: &ScanResult) -> Self {
        let failure = result.failure();
        Self {
            id: result.id().get(),
            url: result.url().to_string(),
            status: result.status().as_str().to_string(),
            external_id: result.external_id().map(str::to_string),
            result_location: result.result_location().map(str::to_string),
            failure_code: failure.map(|f| f.code),
            failure_message: failure.and_then(|f| f.message.clone()),
            failure_description: failure.and_then(|f| f.description.clone()),
            created_at: to_millis(result.created_at()),
            updated_at: to_millis(result.updated_at()),
        }
    }
}
impl TryFrom<ScanResultRow> for ScanResult {
    type Error = Error;
    fn try_from(row: ScanResultRow) -> Result<Self, Self::Error> {
        let failure = row
            .failure_code
            .map(|code| FailureDetails::new(code, row.failure_message, row.failure_description));
        let parts = ScanResultParts {
            id: ScanResultId::from(row.id),
            url: row.url,
            status: row.status.parse::<Status>().or_raise(|| ErrorKind::InvalidData("status"))?,
            external_id: row.external_id,
            result_location: row.result_location,
            failure,
            created_at: from_millis(row.created_at, "created_at")?,
            updated_at: from_millis(row.updated_at, "updated_at")?,
        };
        ScanResult::try_from(parts).or_raise(|| ErrorKind::InvalidData("scan result"))
    }
}

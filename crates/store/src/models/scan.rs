use super::{ScanResultRow, from_millis};
use crate::error::Error;
use timekeeper_model::{Scan, ScanId, ScanResult};

/// A scan joined with the result it points at.
///
/// Scan columns are aliased in the queries so they don't collide with the
/// result's own `id`, `created_at` and `updated_at`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ScanRow {
    pub(crate) scan_id: i64,
    pub(crate) user_id: String,
    pub(crate) scan_created_at: i64,
    pub(crate) scan_updated_at: i64,
    #[sqlx(flatten)]
    pub(crate) result: ScanResultRow,
}
impl TryFrom<ScanRow> for Scan {
    type Error = Error;
    fn try_from(row: ScanRow) -> Result<Self, Self::Error> {
        Ok(Scan {
            id: ScanId::from(row.scan_id),
            user_id: row.user_id,
            result: ScanResult::try_from(row.result)?,
            created_at: from_millis(row.scan_created_at, "scan created_at")?,
            updated_at: from_millis(row.scan_updated_at, "scan updated_at")?,
        })
    }
}

//! SQLite-backed [`ScanStore`].
//!
//! Scans and results are tightly coupled (a scan can't exist without the
//! result it points at), so one repository handles both. Results may be
//! shared by many scans and are never deleted through a scan.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{ScanResultRow, ScanRow, to_millis};
use crate::store::{Creation, ScanStore};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;
use time::UtcDateTime;
use timekeeper_model::{
    Decision, DedupPolicy, Page, PageRequest, Scan, ScanId, ScanResult, ScanResultId, Status, Transition,
};

fn limit_offset(request: PageRequest) -> Result<(i64, i64)> {
    let limit = i64::from(request.page_size());
    let offset = i64::try_from(request.offset()).or_raise(|| ErrorKind::InvalidData("page offset"))?;
    Ok((limit, offset))
}

fn total(count: i64) -> Result<u64> {
    u64::try_from(count).or_raise(|| ErrorKind::InvalidData("row count"))
}

/// Repository for managing scans and scan results in the database.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    async fn insert_result(conn: &mut SqliteConnection, url: &str, now: UtcDateTime) -> Result<ScanResult> {
        let millis = to_millis(now);
        let row: ScanResultRow = sqlx::query_as(include_str!("../queries/insert_scan_result.sql"))
            .bind(url)
            .bind(Status::Submitted.as_str())
            .bind(millis)
            .bind(millis)
            .fetch_one(conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.try_into()
    }

    async fn insert_scan(
        conn: &mut SqliteConnection,
        user_id: &str,
        result_id: ScanResultId,
        now: UtcDateTime,
    ) -> Result<Scan> {
        let millis = to_millis(now);
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_scan.sql"))
            .bind(user_id)
            .bind(result_id.get())
            .bind(millis)
            .bind(millis)
            .fetch_one(&mut *conn)
            .await
            // Most likely the foreign key: the result doesn't exist.
            .or_raise(|| ErrorKind::ResultNotFound(result_id))?;
        Self::fetch_scan(conn, ScanId::from(id))
            .await?
            .ok_or_raise(|| ErrorKind::ScanNotFound(ScanId::from(id)))
    }

    async fn fetch_scan(conn: &mut SqliteConnection, id: ScanId) -> Result<Option<Scan>> {
        let row: Option<ScanRow> = sqlx::query_as(include_str!("../queries/get_scan.sql"))
            .bind(id.get())
            .fetch_optional(conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Scan::try_from).transpose()
    }

    async fn fetch_scan_result(conn: &mut SqliteConnection, id: ScanResultId) -> Result<Option<ScanResult>> {
        let row: Option<ScanResultRow> = sqlx::query_as(include_str!("../queries/get_scan_result.sql"))
            .bind(id.get())
            .fetch_optional(conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(ScanResult::try_from).transpose()
    }

    async fn find_scan_after(
        conn: &mut SqliteConnection,
        user_id: &str,
        url: &str,
        cutoff: UtcDateTime,
    ) -> Result<Option<Scan>> {
        let row: Option<ScanRow> = sqlx::query_as(include_str!("../queries/find_latest_scan_by_user_and_url_after.sql"))
            .bind(user_id)
            .bind(url)
            .bind(to_millis(cutoff))
            .fetch_optional(conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Scan::try_from).transpose()
    }

    async fn find_result_after(conn: &mut SqliteConnection, url: &str, cutoff: UtcDateTime) -> Result<Option<ScanResult>> {
        let row: Option<ScanResultRow> =
            sqlx::query_as(include_str!("../queries/find_latest_scan_result_by_url_after.sql"))
                .bind(url)
                .bind(to_millis(cutoff))
                .fetch_optional(conn)
                .await
                .or_raise(|| ErrorKind::Database)?;
        row.map(ScanResult::try_from).transpose()
    }
}

#[async_trait]
impl ScanStore for Repository {
    async fn create_scan_result(&self, url: &str, now: UtcDateTime) -> Result<ScanResult> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::insert_result(&mut conn, url, now).await
    }

    async fn create_scan(&self, user_id: &str, result_id: ScanResultId, now: UtcDateTime) -> Result<Scan> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::insert_scan(&mut conn, user_id, result_id, now).await
    }

    async fn create_scan_with_result(&self, user_id: &str, url: &str, now: UtcDateTime) -> Result<Scan> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let result = Self::insert_result(&mut tx, url, now).await?;
        let scan = Self::insert_scan(&mut tx, user_id, result.id(), now).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(scan)
    }

    #[instrument(skip(self, policy))]
    async fn create_scan_deduplicated(
        &self,
        user_id: &str,
        url: &str,
        policy: &DedupPolicy,
        now: UtcDateTime,
    ) -> Result<Creation> {
        // IMMEDIATE takes the database write lock before the lookups. Another
        // creator (from any process) waits on the busy timeout until this one
        // commits, then sees its rows.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await.or_raise(|| ErrorKind::Database)?;
        let cutoff = policy.cutoff(now);
        let own = Self::find_scan_after(&mut tx, user_id, url, cutoff).await?;
        let shared = Self::find_result_after(&mut tx, url, cutoff).await?;
        let creation = match policy.decide(own.as_ref(), shared.as_ref(), now) {
            // Nothing written; dropping the transaction rolls it back.
            Decision::Duplicate(existing) => return Ok(Creation::Duplicate(existing)),
            Decision::Reuse(result_id) => Creation::Reused(Self::insert_scan(&mut tx, user_id, result_id, now).await?),
            Decision::Fresh => {
                let result = Self::insert_result(&mut tx, url, now).await?;
                Creation::Fresh(Self::insert_scan(&mut tx, user_id, result.id(), now).await?)
            },
        };
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(creation)
    }

    async fn get_scan(&self, id: ScanId) -> Result<Option<Scan>> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::fetch_scan(&mut conn, id).await
    }

    async fn get_scan_result(&self, id: ScanResultId) -> Result<Option<ScanResult>> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::fetch_scan_result(&mut conn, id).await
    }

    async fn find_latest_scan_by_user_and_url_after(
        &self,
        user_id: &str,
        url: &str,
        cutoff: UtcDateTime,
    ) -> Result<Option<Scan>> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::find_scan_after(&mut conn, user_id, url, cutoff).await
    }

    async fn find_latest_scan_result_by_url_after(
        &self,
        url: &str,
        cutoff: UtcDateTime,
    ) -> Result<Option<ScanResult>> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::find_result_after(&mut conn, url, cutoff).await
    }

    async fn list_scans(&self, user_id: &str, status: Option<Status>, request: PageRequest) -> Result<Page<Scan>> {
        let (limit, offset) = limit_offset(request)?;
        let (rows, count): (Vec<ScanRow>, i64) = match status {
            None => {
                let count = sqlx::query_scalar(include_str!("../queries/count_scans_for_user.sql"))
                    .bind(user_id)
                    .fetch_one(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                let rows = sqlx::query_as(include_str!("../queries/list_scans_for_user.sql"))
                    .bind(user_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                (rows, count)
            },
            Some(status) => {
                let count = sqlx::query_scalar(include_str!("../queries/count_scans_for_user_by_status.sql"))
                    .bind(user_id)
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                let rows = sqlx::query_as(include_str!("../queries/list_scans_for_user_by_status.sql"))
                    .bind(user_id)
                    .bind(status.as_str())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                (rows, count)
            },
        };
        let items = rows.into_iter().map(Scan::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, request, total(count)?))
    }

    async fn list_scan_results(&self, status: Status, request: PageRequest) -> Result<Page<ScanResult>> {
        let (limit, offset) = limit_offset(request)?;
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_scan_results_by_status.sql"))
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let rows: Vec<ScanResultRow> = sqlx::query_as(include_str!("../queries/list_scan_results_by_status.sql"))
            .bind(status.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let items = rows.into_iter().map(ScanResult::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, request, total(count)?))
    }

    async fn update_scan_result(
        &self,
        id: ScanResultId,
        transition: &Transition,
        now: UtcDateTime,
    ) -> Result<ScanResult> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let mut result = Self::fetch_scan_result(&mut tx, id)
            .await?
            .ok_or_raise(|| ErrorKind::ResultNotFound(id))?;
        result.apply(transition, now);
        let row = ScanResultRow::from(&result);
        sqlx::query(include_str!("../queries/update_scan_result.sql"))
            .bind(row.status)
            .bind(row.external_id)
            .bind(row.result_location)
            .bind(row.failure_code)
            .bind(row.failure_message)
            .bind(row.failure_description)
            .bind(row.updated_at)
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(result)
    }

    async fn delete_scan(&self, id: ScanId) -> Result<bool> {
        let outcome = sqlx::query(include_str!("../queries/delete_scan.sql"))
            .bind(id.get())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(outcome.rows_affected() > 0)
    }
}

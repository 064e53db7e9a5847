use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use time::UtcDateTime;
use timekeeper_model::{DedupPolicy, Page, PageRequest, Scan, ScanId, ScanResult, ScanResultId, Status, Transition};

pub type StoreHandle = Arc<dyn ScanStore>;

/// What [`ScanStore::create_scan_deduplicated`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Creation {
    /// The user already has a scan for the URL inside the window; nothing was
    /// written.
    Duplicate(ScanId),
    /// A new scan pointing at a recent result for the same URL.
    Reused(Scan),
    /// A new scan with a new `SUBMITTED` result.
    Fresh(Scan),
}

/// Durable storage for scans and the results they point at.
///
/// Listings are ordered so that paging through them is stable while they are
/// being read:
/// - user listings are newest first (by creation time, then ID);
/// - result listings are oldest first (by creation time, then ID).
///
/// "After" in the `find_*_after` lookups is strict: a record created exactly
/// at the cutoff does not match.
#[async_trait]
pub trait ScanStore: Debug + Send + Sync {
    /// Persist a new result for `url` with status `SUBMITTED`.
    async fn create_scan_result(&self, url: &str, now: UtcDateTime) -> Result<ScanResult>;

    /// Persist a new scan for `user_id` pointing at an existing result.
    async fn create_scan(&self, user_id: &str, result_id: ScanResultId, now: UtcDateTime) -> Result<Scan>;

    /// Persist a new result and a scan pointing at it.
    ///
    /// Implementations backed by a transactional store should override this so
    /// that either both records exist afterwards or neither does.
    async fn create_scan_with_result(&self, user_id: &str, url: &str, now: UtcDateTime) -> Result<Scan> {
        let result = self.create_scan_result(url, now).await?;
        self.create_scan(user_id, result.id(), now).await
    }

    /// Create a scan for `user_id` unless `policy` says it is a duplicate.
    ///
    /// The lookups, the [`DedupPolicy::decide`] call and the inserts happen
    /// under one write lock, so two creators (in this process or another one
    /// sharing the store) can't both pass the duplicate check.
    async fn create_scan_deduplicated(
        &self,
        user_id: &str,
        url: &str,
        policy: &DedupPolicy,
        now: UtcDateTime,
    ) -> Result<Creation>;

    async fn get_scan(&self, id: ScanId) -> Result<Option<Scan>>;

    async fn get_scan_result(&self, id: ScanResultId) -> Result<Option<ScanResult>>;

    /// The newest scan by `user_id` for `url` that was created after `cutoff`.
    async fn find_latest_scan_by_user_and_url_after(
        &self,
        user_id: &str,
        url: &str,
        cutoff: UtcDateTime,
    ) -> Result<Option<Scan>>;

    /// The newest result for `url` (requested by anyone) created after `cutoff`.
    async fn find_latest_scan_result_by_url_after(&self, url: &str, cutoff: UtcDateTime)
    -> Result<Option<ScanResult>>;

    /// One page of the scans owned by `user_id`, optionally restricted to
    /// those whose result currently has `status`.
    async fn list_scans(&self, user_id: &str, status: Option<Status>, request: PageRequest) -> Result<Page<Scan>>;

    /// One page of the results currently in `status`.
    async fn list_scan_results(&self, status: Status, request: PageRequest) -> Result<Page<ScanResult>>;

    /// Apply `transition` to the stored result and persist it.
    ///
    /// Returns [`ResultNotFound`](crate::error::ErrorKind::ResultNotFound) if
    /// the result no longer exists.
    async fn update_scan_result(
        &self,
        id: ScanResultId,
        transition: &Transition,
        now: UtcDateTime,
    ) -> Result<ScanResult>;

    /// Delete a scan (never its result). Returns whether anything was deleted.
    async fn delete_scan(&self, id: ScanId) -> Result<bool>;
}

use crate::clock::ClockHandle;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::ops::Deref;
use time::UtcDateTime;
use timekeeper_model::{
    DedupPolicy, Page, PageRequest, Scan, ScanId, ScanResult, ScanResultId, ScanSummary, Status, Transition,
};
use timekeeper_store::{Creation, StoreHandle};
use tracing::instrument;

/// Everything users and sweepers can do with scans.
///
/// Scan creation is serialized by the store: the duplicate check and the
/// insert run under its write lock, so concurrent requests for the same
/// (user, URL) pair can't both pass the check, even from separate processes.
#[derive(Debug)]
pub struct ScanService {
    store: StoreHandle,
    clock: ClockHandle,
    policy: DedupPolicy,
}

impl ScanService {
    pub fn new(store: StoreHandle, clock: ClockHandle, policy: DedupPolicy) -> Self {
        Self { store, clock, policy }
    }

    /// Build a page request for a user-facing listing, capping the page size.
    pub fn page_request(page: u32, page_size: u32) -> Result<PageRequest> {
        PageRequest::clamped(page, page_size).or_raise(|| ErrorKind::InvalidPage)
    }

    /// Request a scan of `url` for `user_id`.
    ///
    /// # Errors
    /// [`ErrorKind::DuplicateRequest`] if the user already requested the URL
    /// within the dedupe window.
    pub async fn create_scan(&self, user_id: &str, url: &str) -> Result<Scan> {
        self.create_scan_at(user_id, url, self.clock.now()).await
    }

    #[instrument(skip(self))]
    pub async fn create_scan_at(&self, user_id: &str, url: &str, now: UtcDateTime) -> Result<Scan> {
        let creation = self
            .store
            .create_scan_deduplicated(user_id, url, &self.policy, now)
            .await
            .or_raise(|| ErrorKind::Store)?;
        let (scan, reused) = match creation {
            Creation::Duplicate(existing) => {
                tracing::info!(scan_id = %existing, "Rejected duplicate scan request");
                exn::bail!(ErrorKind::DuplicateRequest(existing));
            },
            Creation::Reused(scan) => (scan, true),
            Creation::Fresh(scan) => (scan, false),
        };
        tracing::info!(scan_id = %scan.id, result_id = %scan.result.id(), reused, "Created scan");
        Ok(scan)
    }

    /// Fetch a scan owned by `user_id`.
    ///
    /// Someone else's scan is reported exactly like a missing one.
    pub async fn get_scan(&self, user_id: &str, id: ScanId) -> Result<Scan> {
        self.store
            .get_scan(id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .filter(|scan| scan.is_owned_by(user_id))
            .ok_or_raise(|| ErrorKind::ScanNotFound(id))
    }

    /// A page of `user_id`'s scans, newest first.
    pub async fn list_scan_summaries(
        &self,
        user_id: &str,
        status: Option<Status>,
        request: PageRequest,
    ) -> Result<Page<ScanSummary>> {
        let page = self
            .store
            .list_scans(user_id, status, request)
            .await
            .or_raise(|| ErrorKind::Store)?;
        Ok(page.map(ScanSummary::from))
    }

    /// Delete one of `user_id`'s scans. The scan result is left alone.
    ///
    /// Deleting a missing (or someone else's) scan is not an error; returns
    /// whether anything was deleted.
    #[instrument(skip(self))]
    pub async fn delete_scan(&self, user_id: &str, id: ScanId) -> Result<bool> {
        let owned = self
            .store
            .get_scan(id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .is_some_and(|scan| scan.is_owned_by(user_id));
        if !owned {
            return Ok(false);
        }
        let deleted = self.store.delete_scan(id).await.or_raise(|| ErrorKind::Store)?;
        if deleted {
            tracing::info!(scan_id = %id, "Deleted scan");
        }
        Ok(deleted)
    }

    /// Apply a lifecycle transition to a scan result.
    pub async fn update_scan_result(&self, id: ScanResultId, transition: &Transition) -> Result<ScanResult> {
        match self.store.update_scan_result(id, transition, self.clock.now()).await {
            Ok(result) => Ok(result),
            Err(err) if err.deref().is_not_found() => Err(err).or_raise(|| ErrorKind::ResultNotFound(id)),
            Err(err) => Err(err).or_raise(|| ErrorKind::Store),
        }
    }

    /// A page of the results in `status`, oldest first.
    pub async fn list_scan_results(&self, status: Status, request: PageRequest) -> Result<Page<ScanResult>> {
        self.store
            .list_scan_results(status, request)
            .await
            .or_raise(|| ErrorKind::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use time::Duration;
    use timekeeper_model::FailureDetails;
    use timekeeper_store::{MockStore, ScanStore};

    const URL: &str = "https://example.com";

    fn start() -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn service() -> (ScanService, Arc<MockStore>, Arc<ManualClock>) {
        let store = Arc::new(MockStore::default());
        let clock = Arc::new(ManualClock::new(start()));
        let service = ScanService::new(store.clone(), clock.clone(), DedupPolicy::default());
        (service, store, clock)
    }

    #[tokio::test]
    async fn test_duplicate_within_window() {
        let (service, store, clock) = service();
        let first = service.create_scan("alice", URL).await.unwrap();
        assert_eq!(first.result.status(), Status::Submitted);

        clock.advance(Duration::hours(23));
        let err = service.create_scan("alice", URL).await.unwrap_err();
        assert_eq!(*err, ErrorKind::DuplicateRequest(first.id));
        assert_eq!(store.scan_count().await, 1);
    }

    #[tokio::test]
    async fn test_reuse_across_users() {
        let (service, store, clock) = service();
        let first = service.create_scan("alice", URL).await.unwrap();
        clock.advance(Duration::hours(12));
        let second = service.create_scan("bob", URL).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.result.id(), first.result.id());
        assert_eq!(store.results().await.len(), 1);
        assert_eq!(second.created_at, start() + Duration::hours(12));
    }

    #[tokio::test]
    async fn test_reuse_leaves_result_untouched() {
        let (service, store, clock) = service();
        let first = service.create_scan("alice", URL).await.unwrap();
        let failed = Transition::Failed(FailureDetails::new(400, None, None));
        let before = store.update_scan_result(first.result.id(), &failed, start()).await.unwrap();
        clock.advance(Duration::hours(1));
        let second = service.create_scan("bob", URL).await.unwrap();
        assert_eq!(second.result, before);
    }

    #[tokio::test]
    async fn test_fresh_after_window() {
        let (service, store, clock) = service();
        let first = service.create_scan("alice", URL).await.unwrap();
        clock.advance(Duration::days(1));
        let second = service.create_scan("alice", URL).await.unwrap();
        assert_ne!(second.result.id(), first.result.id());
        assert_eq!(second.result.status(), Status::Submitted);
        assert_eq!(store.results().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_is_serialized() {
        let store = Arc::new(MockStore::default());
        let clock = Arc::new(ManualClock::new(start()));
        // Independent services (as in separate processes) sharing one store.
        let attempts: Vec<_> = (0..10)
            .map(|_| {
                let service = ScanService::new(store.clone(), clock.clone(), DedupPolicy::default());
                tokio::spawn(async move { service.create_scan("alice", URL).await })
            })
            .collect();
        let mut created = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(&*err, ErrorKind::DuplicateRequest(_))),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.scan_count().await, 1);
    }

    #[tokio::test]
    async fn test_store_failure_on_create() {
        let (service, store, _) = service();
        store.set_unavailable(true);
        let err = service.create_scan("alice", URL).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Store);
    }

    #[tokio::test]
    async fn test_get_scan_checks_owner() {
        let (service, _, _) = service();
        let scan = service.create_scan("alice", URL).await.unwrap();
        assert_eq!(service.get_scan("alice", scan.id).await.unwrap(), scan);
        let err = service.get_scan("bob", scan.id).await.unwrap_err();
        assert_eq!(*err, ErrorKind::ScanNotFound(scan.id));
        let err = service.get_scan("alice", ScanId::from(99)).await.unwrap_err();
        assert_eq!(*err, ErrorKind::ScanNotFound(ScanId::from(99)));
    }

    #[tokio::test]
    async fn test_list_scan_summaries() {
        let (service, _, clock) = service();
        for i in 0..3 {
            service.create_scan("alice", &format!("https://example.com/{i}")).await.unwrap();
            clock.advance(Duration::seconds(1));
        }
        service.create_scan("bob", URL).await.unwrap();

        let page = service
            .list_scan_summaries("alice", None, ScanService::page_request(0, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(page.total_items, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].url, "https://example.com/2");
        assert_eq!(page.items[1].url, "https://example.com/1");

        let done = service
            .list_scan_summaries("alice", Some(Status::Done), PageRequest::default())
            .await
            .unwrap();
        assert!(done.items.is_empty());
    }

    #[test]
    fn test_page_request_validation() {
        let err = ScanService::page_request(0, 0).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidPage);
        assert_eq!(ScanService::page_request(1, 100).unwrap().page_size(), 20);
    }

    #[tokio::test]
    async fn test_delete_scan() {
        let (service, store, _) = service();
        let scan = service.create_scan("alice", URL).await.unwrap();
        assert!(!service.delete_scan("bob", scan.id).await.unwrap());
        assert!(service.delete_scan("alice", scan.id).await.unwrap());
        assert!(!service.delete_scan("alice", scan.id).await.unwrap());
        assert_eq!(store.scan_count().await, 0);
        // The shared result outlives the scan.
        assert_eq!(store.results().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_scan_result() {
        let (service, _, clock) = service();
        let scan = service.create_scan("alice", URL).await.unwrap();
        clock.advance(Duration::seconds(30));
        let updated = service.update_scan_result(scan.result.id(), &Transition::Done).await.unwrap();
        assert_eq!(updated.status(), Status::Done);
        assert_eq!(updated.updated_at(), start() + Duration::seconds(30));

        let err = service
            .update_scan_result(ScanResultId::from(99), &Transition::Done)
            .await
            .unwrap_err();
        assert_eq!(*err, ErrorKind::ResultNotFound(ScanResultId::from(99)));
    }

    #[tokio::test]
    async fn test_list_scan_results() {
        let (service, _, clock) = service();
        service.create_scan("alice", "https://a.example").await.unwrap();
        clock.advance(Duration::seconds(1));
        service.create_scan("alice", "https://b.example").await.unwrap();
        let page = service
            .list_scan_results(Status::Submitted, PageRequest::default())
            .await
            .unwrap();
        let urls: Vec<_> = page.items.iter().map(|r| r.url()).collect();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }
}

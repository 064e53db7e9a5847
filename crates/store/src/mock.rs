//! In-memory scan store for testing.

use crate::error::{ErrorKind, Result};
use crate::store::{Creation, ScanStore};
use async_trait::async_trait;
use exn::OptionExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use time::UtcDateTime;
use timekeeper_model::{
    Decision, DedupPolicy, Page, PageRequest, Scan, ScanId, ScanResult, ScanResultId, Status, Transition,
};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct ScanEntry {
    user_id: String,
    result_id: ScanResultId,
    created_at: UtcDateTime,
    updated_at: UtcDateTime,
}

#[derive(Debug, Default)]
struct State {
    next_result_id: i64,
    next_scan_id: i64,
    results: BTreeMap<ScanResultId, ScanResult>,
    scans: BTreeMap<ScanId, ScanEntry>,
}
impl State {
    fn scan(&self, id: ScanId) -> Option<Scan> {
        let entry = self.scans.get(&id)?;
        let result = self.results.get(&entry.result_id)?;
        Some(Scan {
            id,
            user_id: entry.user_id.clone(),
            result: result.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        })
    }

    fn insert_result(&mut self, url: &str, now: UtcDateTime) -> ScanResult {
        self.next_result_id += 1;
        let result = ScanResult::submitted(ScanResultId::from(self.next_result_id), url, now);
        self.results.insert(result.id(), result.clone());
        result
    }

    fn insert_scan(&mut self, user_id: &str, result_id: ScanResultId, now: UtcDateTime) -> Result<Scan> {
        if !self.results.contains_key(&result_id) {
            exn::bail!(ErrorKind::ResultNotFound(result_id));
        }
        self.next_scan_id += 1;
        let id = ScanId::from(self.next_scan_id);
        self.scans.insert(
            id,
            ScanEntry {
                user_id: user_id.to_string(),
                result_id,
                created_at: now,
                updated_at: now,
            },
        );
        self.scan(id).ok_or_raise(|| ErrorKind::ScanNotFound(id))
    }

    fn latest_scan_after(&self, user_id: &str, url: &str, cutoff: UtcDateTime) -> Option<Scan> {
        self.scans
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id && entry.created_at > cutoff)
            .filter(|(_, entry)| self.results.get(&entry.result_id).is_some_and(|r| r.url() == url))
            .max_by_key(|(id, entry)| (entry.created_at, **id))
            .and_then(|(id, _)| self.scan(*id))
    }

    fn latest_result_after(&self, url: &str, cutoff: UtcDateTime) -> Option<ScanResult> {
        self.results
            .values()
            .filter(|r| r.url() == url && r.created_at() > cutoff)
            .max_by_key(|r| (r.created_at(), r.id()))
            .cloned()
    }

    fn paginate<T: Clone>(items: Vec<T>, request: PageRequest) -> Page<T> {
        let total = items.len() as u64;
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let page = items
            .into_iter()
            .skip(offset)
            .take(request.page_size() as usize)
            .collect();
        Page::new(page, request, total)
    }
}

/// In-memory [`ScanStore`] for testing.
///
/// Orders listings and matches cutoffs exactly like the SQLite
/// [`Repository`](crate::Repository), so tests written against one hold for
/// the other. IDs are assigned sequentially starting at 1.
///
/// # Examples
///
/// ```
/// use time::UtcDateTime;
/// use timekeeper_model::DedupPolicy;
/// use timekeeper_store::{Creation, MockStore, ScanStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MockStore::default();
/// let policy = DedupPolicy::default();
/// let now = UtcDateTime::now();
/// let first = store.create_scan_deduplicated("alice", "https://example.com", &policy, now).await.unwrap();
/// assert!(matches!(first, Creation::Fresh(_)));
/// let again = store.create_scan_deduplicated("alice", "https://example.com", &policy, now).await.unwrap();
/// assert!(matches!(again, Creation::Duplicate(_)));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl MockStore {
    /// Insert (or replace) a result as-is, bypassing the lifecycle.
    ///
    /// Useful for seeding results in an arbitrary state. Later generated IDs
    /// will not collide with the inserted one.
    pub async fn insert_result(&self, result: ScanResult) {
        let mut state = self.state.write().await;
        state.next_result_id = state.next_result_id.max(result.id().get());
        state.results.insert(result.id(), result);
    }

    /// Remove a result, simulating a concurrent deletion.
    pub async fn remove_result(&self, id: ScanResultId) -> Option<ScanResult> {
        self.state.write().await.results.remove(&id)
    }

    /// All stored results, ordered by ID.
    pub async fn results(&self) -> Vec<ScanResult> {
        self.state.read().await.results.values().cloned().collect()
    }

    pub async fn scan_count(&self) -> usize {
        self.state.read().await.scans.len()
    }

    /// Make every subsequent call fail with [`ErrorKind::Database`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Database);
        }
        Ok(())
    }
}

#[async_trait]
impl ScanStore for MockStore {
    async fn create_scan_result(&self, url: &str, now: UtcDateTime) -> Result<ScanResult> {
        self.check_available()?;
        Ok(self.state.write().await.insert_result(url, now))
    }

    async fn create_scan(&self, user_id: &str, result_id: ScanResultId, now: UtcDateTime) -> Result<Scan> {
        self.check_available()?;
        self.state.write().await.insert_scan(user_id, result_id, now)
    }

    async fn create_scan_deduplicated(
        &self,
        user_id: &str,
        url: &str,
        policy: &DedupPolicy,
        now: UtcDateTime,
    ) -> Result<Creation> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let cutoff = policy.cutoff(now);
        let own = state.latest_scan_after(user_id, url, cutoff);
        let shared = state.latest_result_after(url, cutoff);
        Ok(match policy.decide(own.as_ref(), shared.as_ref(), now) {
            Decision::Duplicate(existing) => Creation::Duplicate(existing),
            Decision::Reuse(result_id) => Creation::Reused(state.insert_scan(user_id, result_id, now)?),
            Decision::Fresh => {
                let result = state.insert_result(url, now);
                Creation::Fresh(state.insert_scan(user_id, result.id(), now)?)
            },
        })
    }

    async fn get_scan(&self, id: ScanId) -> Result<Option<Scan>> {
        self.check_available()?;
        Ok(self.state.read().await.scan(id))
    }

    async fn get_scan_result(&self, id: ScanResultId) -> Result<Option<ScanResult>> {
        self.check_available()?;
        Ok(self.state.read().await.results.get(&id).cloned())
    }

    async fn find_latest_scan_by_user_and_url_after(
        &self,
        user_id: &str,
        url: &str,
        cutoff: UtcDateTime,
    ) -> Result<Option<Scan>> {
        self.check_available()?;
        Ok(self.state.read().await.latest_scan_after(user_id, url, cutoff))
    }

    async fn find_latest_scan_result_by_url_after(
        &self,
        url: &str,
        cutoff: UtcDateTime,
    ) -> Result<Option<ScanResult>> {
        self.check_available()?;
        Ok(self.state.read().await.latest_result_after(url, cutoff))
    }

    async fn list_scans(&self, user_id: &str, status: Option<Status>, request: PageRequest) -> Result<Page<Scan>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut scans: Vec<Scan> = state
            .scans
            .keys()
            .filter_map(|id| state.scan(*id))
            .filter(|scan| scan.is_owned_by(user_id))
            .filter(|scan| status.is_none_or(|status| scan.result.status() == status))
            .collect();
        scans.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(State::paginate(scans, request))
    }

    async fn list_scan_results(&self, status: Status, request: PageRequest) -> Result<Page<ScanResult>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut results: Vec<ScanResult> = state.results.values().filter(|r| r.status() == status).cloned().collect();
        results.sort_by_key(|r| (r.created_at(), r.id()));
        Ok(State::paginate(results, request))
    }

    async fn update_scan_result(
        &self,
        id: ScanResultId,
        transition: &Transition,
        now: UtcDateTime,
    ) -> Result<ScanResult> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let result = state.results.get_mut(&id).ok_or_raise(|| ErrorKind::ResultNotFound(id))?;
        result.apply(transition, now);
        Ok(result.clone())
    }

    async fn delete_scan(&self, id: ScanId) -> Result<bool> {
        self.check_available()?;
        Ok(self.state.write().await.scans.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_700_000_000 + seconds).unwrap()
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = MockStore::default();
        let first = store.create_scan_with_result("alice", "https://a.example", at(0)).await.unwrap();
        let second = store.create_scan_with_result("alice", "https://b.example", at(1)).await.unwrap();
        assert_eq!(first.id, ScanId::from(1));
        assert_eq!(second.result.id(), ScanResultId::from(2));
    }

    #[tokio::test]
    async fn test_inserted_results_do_not_collide() {
        let store = MockStore::default();
        store
            .insert_result(ScanResult::submitted(ScanResultId::from(10), "https://a.example", at(0)))
            .await;
        let next = store.create_scan_result("https://b.example", at(1)).await.unwrap();
        assert_eq!(next.id(), ScanResultId::from(11));
    }

    #[tokio::test]
    async fn test_listing_order_matches_sqlite() {
        let store = MockStore::default();
        for i in [2, 0, 1] {
            store.create_scan_with_result("alice", &format!("https://example.com/{i}"), at(i)).await.unwrap();
        }
        let scans = store.list_scans("alice", None, PageRequest::default()).await.unwrap();
        let urls: Vec<_> = scans.items.iter().map(|s| s.result.url().to_string()).collect();
        assert_eq!(urls, vec!["https://example.com/2", "https://example.com/1", "https://example.com/0"]);

        let results = store.list_scan_results(Status::Submitted, PageRequest::new(0, 2).unwrap()).await.unwrap();
        let urls: Vec<_> = results.items.iter().map(|r| r.url().to_string()).collect();
        assert_eq!(urls, vec!["https://example.com/0", "https://example.com/1"]);
        assert_eq!(results.total_pages, 2);
    }

    #[tokio::test]
    async fn test_cutoff_is_strict() {
        let store = MockStore::default();
        store.create_scan_with_result("alice", "https://a.example", at(0)).await.unwrap();
        assert!(store.find_latest_scan_result_by_url_after("https://a.example", at(0)).await.unwrap().is_none());
        assert!(store.find_latest_scan_result_by_url_after("https://a.example", at(-1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_scan_deduplicated() {
        let store = MockStore::default();
        let policy = DedupPolicy::default();
        let Creation::Fresh(first) = store
            .create_scan_deduplicated("alice", "https://a.example", &policy, at(0))
            .await
            .unwrap()
        else {
            panic!("expected a fresh scan");
        };
        assert_eq!(
            store.create_scan_deduplicated("alice", "https://a.example", &policy, at(1)).await.unwrap(),
            Creation::Duplicate(first.id)
        );
        let reused = store.create_scan_deduplicated("bob", "https://a.example", &policy, at(1)).await.unwrap();
        assert!(matches!(reused, Creation::Reused(scan) if scan.result.id() == first.result.id()));
        assert_eq!(store.scan_count().await, 2);
        assert_eq!(store.results().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MockStore::default();
        store.set_unavailable(true);
        let err = store.list_scan_results(Status::Submitted, PageRequest::default()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Database));
        store.set_unavailable(false);
        assert!(store.list_scan_results(Status::Submitted, PageRequest::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_removed_result() {
        let store = MockStore::default();
        let result = store.create_scan_result("https://a.example", at(0)).await.unwrap();
        store.remove_result(result.id()).await;
        let err = store.update_scan_result(result.id(), &Transition::Done, at(1)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ResultNotFound(_)));
    }
}

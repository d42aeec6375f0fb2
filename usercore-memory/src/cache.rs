//! Read-through/write-through cache in front of another store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use usercore::errors::StoreResult;
use usercore::query::QuerySpec;
use usercore::store::UserStore;
use usercore::types::UserId;
use usercore::user::User;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<UserId, User>,
    // bumped on every write so a slow read-through cannot install a stale value
    generation: u64,
}

/// Caches users from a backing store.
///
/// `get` is read-through: misses are loaded from the backend and remembered.
/// `save` and `delete` are write-through: the entry is evicted, the backend
/// is written, and only a successful save repopulates the cache. A backend
/// failure therefore leaves nothing stale behind. `list` and `query` always go
/// to the backend, which stays authoritative.
///
/// Writes are serialized across the backend call and the cache update, so
/// the cache applies them in the order the backend committed them.
#[derive(Debug, Clone)]
pub struct CachingUserStore<B> {
    backend: B,
    state: Arc<RwLock<CacheState>>,
    writes: Arc<Mutex<()>>,
}

impl<B> CachingUserStore<B> {
    /// Wraps `backend` with an empty cache.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Arc::new(RwLock::new(CacheState::default())),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// The wrapped store.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of cached users.
    pub fn cached_len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// True when `id` is currently cached.
    pub fn is_cached(&self, id: &UserId) -> bool {
        self.state.read().entries.contains_key(id)
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.generation += 1;
    }

    // Runs before every backend write: a write cancelled after the backend
    // commits must not leave the previous value cached.
    fn evict(&self, id: &UserId) {
        let mut state = self.state.write();
        state.entries.remove(id);
        state.generation += 1;
    }
}

#[async_trait]
impl<B> UserStore for CachingUserStore<B>
where
    B: UserStore,
{
    async fn get(&self, id: &UserId) -> StoreResult<Option<User>> {
        let generation = {
            let state = self.state.read();
            if let Some(user) = state.entries.get(id) {
                return Ok(Some(user.clone()));
            }
            state.generation
        };

        let loaded = self.backend.get(id).await?;

        if let Some(user) = &loaded {
            let mut state = self.state.write();
            if state.generation == generation {
                state.entries.insert(*id, user.clone());
                debug!(user_id = %id, "Cached user on read");
            }
        }
        Ok(loaded)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        self.backend.list().await
    }

    async fn save(&self, user: User) -> StoreResult<User> {
        let _writing = self.writes.lock().await;
        if let Some(id) = user.id() {
            self.evict(&id);
        }

        let saved = self.backend.save(user).await.inspect_err(|e| {
            warn!(error = %e, "Backend rejected save");
        })?;

        if let Some(id) = saved.id() {
            let mut state = self.state.write();
            state.entries.insert(id, saved.clone());
            state.generation += 1;
        }
        Ok(saved)
    }

    async fn delete(&self, id: &UserId) -> StoreResult<bool> {
        let _writing = self.writes.lock().await;
        self.evict(id);

        let removed = self.backend.delete(id).await.inspect_err(|e| {
            warn!(error = %e, "Backend rejected delete");
        })?;
        // a read-through that raced the backend call may have re-cached it
        self.evict(id);
        Ok(removed)
    }

    async fn query(&self, spec: &QuerySpec) -> StoreResult<Vec<User>> {
        self.backend.query(spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryUserStore;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;
    use usercore::errors::StoreError;

    /// Backend that counts reads, can be switched into failure, and can
    /// stall after committing a save.
    #[derive(Clone, Default)]
    struct FlakyStore {
        inner: InMemoryUserStore,
        failing: Arc<AtomicBool>,
        reads: Arc<AtomicUsize>,
        save_stall_ms: Arc<AtomicU64>,
    }

    impl FlakyStore {
        fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn stall_saves(&self, stall: Duration) {
            let millis = u64::try_from(stall.as_millis()).unwrap();
            self.save_stall_ms.store(millis, Ordering::SeqCst);
        }

        fn check(&self) -> StoreResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(StoreError::Unavailable("backend offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl UserStore for FlakyStore {
        async fn get(&self, id: &UserId) -> StoreResult<Option<User>> {
            self.check()?;
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(id).await
        }

        async fn list(&self) -> StoreResult<Vec<User>> {
            self.check()?;
            self.inner.list().await
        }

        async fn save(&self, user: User) -> StoreResult<User> {
            self.check()?;
            let saved = self.inner.save(user).await?;
            let stall = self.save_stall_ms.load(Ordering::SeqCst);
            if stall > 0 {
                tokio::time::sleep(Duration::from_millis(stall)).await;
            }
            Ok(saved)
        }

        async fn delete(&self, id: &UserId) -> StoreResult<bool> {
            self.check()?;
            self.inner.delete(id).await
        }
    }

    fn user(name: &str) -> User {
        User::new(name, format!("{name}@example.com"))
    }

    #[tokio::test]
    async fn save_writes_through() {
        let store = CachingUserStore::new(FlakyStore::default());

        let saved = store.save(user("john_doe")).await.unwrap();
        let id = saved.id().unwrap();

        assert!(store.is_cached(&id));
        assert_eq!(store.backend().inner.get(&id).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn get_reads_through_once() {
        let backend = FlakyStore::default();
        let id = backend.inner.save(user("john_doe")).await.unwrap().id().unwrap();
        let store = CachingUserStore::new(backend);

        assert!(!store.is_cached(&id));
        assert!(store.get(&id).await.unwrap().is_some());
        assert!(store.get(&id).await.unwrap().is_some());

        assert_eq!(store.backend().reads.load(Ordering::SeqCst), 1);
        assert!(store.is_cached(&id));
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let store = CachingUserStore::new(FlakyStore::default());
        assert_eq!(store.get(&UserId::new()).await.unwrap(), None);
        assert_eq!(store.cached_len(), 0);
    }

    #[tokio::test]
    async fn delete_evicts() {
        let store = CachingUserStore::new(FlakyStore::default());
        let id = store.save(user("john_doe")).await.unwrap().id().unwrap();

        assert!(store.delete(&id).await.unwrap());

        assert!(!store.is_cached(&id));
        assert_eq!(store.get(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn backend_failure_surfaces_and_leaves_nothing_stale() {
        let store = CachingUserStore::new(FlakyStore::default());
        let saved = store.save(user("john_doe")).await.unwrap();
        let id = saved.id().unwrap();

        store.backend().fail(true);

        let save = store.save(saved.clone().with_active(false)).await;
        let delete = store.delete(&id).await;

        assert!(matches!(save, Err(StoreError::Unavailable(_))));
        assert!(matches!(delete, Err(StoreError::Unavailable(_))));
        assert!(!store.is_cached(&id));

        store.backend().fail(false);
        // the next read sees the last committed value
        assert_eq!(store.get(&id).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn query_goes_to_backend() {
        let backend = FlakyStore::default();
        backend.inner.save(user("john_doe")).await.unwrap();
        let store = CachingUserStore::new(backend);

        let found = store.query(&QuerySpec::by_username("john_doe")).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(store.cached_len(), 0);
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let store = CachingUserStore::new(FlakyStore::default());
        store.save(user("john_doe")).await.unwrap();

        store.clear();

        assert_eq!(store.cached_len(), 0);
    }

    #[tokio::test]
    async fn delete_during_stalled_save_stays_deleted() {
        let store = CachingUserStore::new(FlakyStore::default());
        let saved = store.save(user("john_doe")).await.unwrap();
        let id = saved.id().unwrap();
        store.backend().stall_saves(Duration::from_millis(100));

        let saver = {
            let store = store.clone();
            tokio::spawn(async move { store.save(saved.with_active(false)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.delete(&id).await.unwrap());
        saver.await.unwrap().unwrap();

        assert_eq!(store.backend().inner.get(&id).await.unwrap(), None);
        assert_eq!(store.get(&id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_to_one_identity_agree_with_backend() {
        let store = CachingUserStore::new(FlakyStore::default());
        let saved = store.save(user("john_doe")).await.unwrap();
        let id = saved.id().unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                let update = saved.clone().with_display_name(format!("name {i}"));
                tokio::spawn(async move { store.save(update).await })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let committed = store.backend().inner.get(&id).await.unwrap();
        assert!(committed.is_some());
        assert_eq!(store.get(&id).await.unwrap(), committed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_save_and_delete_agree_with_backend() {
        for round in 0..20 {
            let store = CachingUserStore::new(FlakyStore::default());
            let saved = store.save(user(&format!("user_{round}"))).await.unwrap();
            let id = saved.id().unwrap();

            let saver = {
                let store = store.clone();
                tokio::spawn(async move { store.save(saved.with_active(false)).await })
            };
            let deleter = {
                let store = store.clone();
                tokio::spawn(async move { store.delete(&id).await })
            };
            let reader = {
                let store = store.clone();
                tokio::spawn(async move { store.get(&id).await })
            };
            saver.await.unwrap().unwrap();
            deleter.await.unwrap().unwrap();
            reader.await.unwrap().unwrap();

            let committed = store.backend().inner.get(&id).await.unwrap();
            assert_eq!(store.get(&id).await.unwrap(), committed);
        }
    }
}

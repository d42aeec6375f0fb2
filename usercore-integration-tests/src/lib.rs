//! Shared fixtures for `UserCore` integration tests
//!
//! Notifier and store doubles that let tests observe what the service does
//! off the caller's path: notifications delivered, failures injected, and
//! read-modify-write sequences that overlap.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use usercore::{
    NotifyError, Notifier, ServiceConfig, StoreError, StoreResult, User, UserId, UserService,
    UserStore,
};
use usercore_memory::InMemoryUserStore;

/// A service over a fresh in-memory store with notifications disabled.
pub fn quiet_service() -> UserService<InMemoryUserStore> {
    UserService::new(
        InMemoryUserStore::new(),
        usercore::NoopNotifier,
        ServiceConfig::default().with_notifications(usercore::NotificationPolicy::Disabled),
    )
}

/// Forwards every notified user over a channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<User>,
}

impl ChannelNotifier {
    /// A notifier and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<User>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, user: &User) -> Result<(), NotifyError> {
        self.sender
            .send(user.clone())
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

/// Always fails, counting attempts.
#[derive(Debug, Clone, Default)]
pub struct FailingNotifier {
    attempts: Arc<AtomicUsize>,
}

impl FailingNotifier {
    /// How many deliveries were attempted.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _user: &User) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Delivery("mail relay rejected message".to_string()))
    }
}

/// Sleeps before succeeding.
#[derive(Debug, Clone, Copy)]
pub struct SlowNotifier {
    delay: Duration,
}

impl SlowNotifier {
    /// A notifier that takes `delay` per delivery.
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Notifier for SlowNotifier {
    async fn notify(&self, _user: &User) -> Result<(), NotifyError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Store that tracks overlapping read-modify-write sequences per identity.
///
/// A `get` that finds a user opens a sequence for that identity and the next
/// `save` or `delete` of it closes one. If two sequences on one identity are
/// ever open at once, [`max_overlap`](Self::max_overlap) exceeds one.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    inner: InMemoryUserStore,
    open: Arc<Mutex<HashMap<UserId, usize>>>,
    max_overlap: Arc<AtomicUsize>,
    write_delay: Option<Duration>,
}

impl RecordingStore {
    /// A recording store whose writes pause for `delay` to widen races.
    pub fn with_write_delay(delay: Duration) -> Self {
        Self {
            write_delay: Some(delay),
            ..Self::default()
        }
    }

    /// The highest number of concurrently open sequences seen on any
    /// single identity.
    pub fn max_overlap(&self) -> usize {
        self.max_overlap.load(Ordering::SeqCst)
    }

    fn close(&self, id: UserId) {
        let mut open = self.open.lock();
        if let Some(count) = open.get_mut(&id) {
            *count = count.saturating_sub(1);
        }
    }
}

#[async_trait]
impl UserStore for RecordingStore {
    async fn get(&self, id: &UserId) -> StoreResult<Option<User>> {
        let found = self.inner.get(id).await?;
        if found.is_some() {
            let mut open = self.open.lock();
            let count = open.entry(*id).or_default();
            *count += 1;
            self.max_overlap.fetch_max(*count, Ordering::SeqCst);
        }
        Ok(found)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        self.inner.list().await
    }

    async fn save(&self, user: User) -> StoreResult<User> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        let id = user.id();
        let saved = self.inner.save(user).await;
        if let Some(id) = id {
            self.close(id);
        }
        saved
    }

    async fn delete(&self, id: &UserId) -> StoreResult<bool> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.close(*id);
        self.inner.delete(id).await
    }
}

/// Store whose every operation fails as an unreachable backend would.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachableStore;

#[async_trait]
impl UserStore for UnreachableStore {
    async fn get(&self, _id: &UserId) -> StoreResult<Option<User>> {
        Err(unreachable_backend())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Err(unreachable_backend())
    }

    async fn save(&self, _user: User) -> StoreResult<User> {
        Err(unreachable_backend())
    }

    async fn delete(&self, _id: &UserId) -> StoreResult<bool> {
        Err(unreachable_backend())
    }
}

fn unreachable_backend() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

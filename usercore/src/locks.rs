//! Per-identity async locks.
//!
//! Read-modify-write sequences against one identity serialize on that
//! identity's lock while operations on different identities proceed in
//! parallel. Entries are dropped once no task holds or awaits them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::types::UserId;

type Slot = Arc<AsyncMutex<()>>;

#[derive(Debug, Clone, Default)]
pub(crate) struct IdentityLocks {
    slots: Arc<Mutex<HashMap<UserId, Slot>>>,
}

impl IdentityLocks {
    /// Waits until the lock for `id` is free and takes it.
    ///
    /// Cancelling the wait releases this caller's claim on the slot.
    pub(crate) async fn acquire(&self, id: UserId) -> IdentityGuard {
        let lease = SlotLease {
            id,
            slot: Arc::clone(self.slots.lock().entry(id).or_default()),
            slots: Arc::clone(&self.slots),
        };
        let guard = Arc::clone(&lease.slot).lock_owned().await;
        IdentityGuard {
            _guard: guard,
            _lease: lease,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

/// A caller's claim on a slot, held while waiting and while locked.
struct SlotLease {
    id: UserId,
    slot: Slot,
    slots: Arc<Mutex<HashMap<UserId, Slot>>>,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        // the map and this lease are the only owners: nobody else holds or awaits it
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.id);
        }
    }
}

// Fields drop in declaration order: the lock is released before the lease.
pub(crate) struct IdentityGuard {
    _guard: OwnedMutexGuard<()>,
    _lease: SlotLease,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_identity_serializes() {
        let locks = IdentityLocks::default();
        let id = UserId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                tokio::spawn(async move {
                    let _guard = locks.acquire(id).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn different_identities_do_not_block() {
        let locks = IdentityLocks::default();
        let _first = locks.acquire(UserId::new()).await;

        let second = tokio::time::timeout(Duration::from_secs(1), locks.acquire(UserId::new())).await;

        assert!(second.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_waiter_releases_its_slot() {
        let locks = IdentityLocks::default();
        let id = UserId::new();
        let holder = locks.acquire(id).await;

        let mut waiter = Box::pin(locks.acquire(id));
        let parked = tokio::time::timeout(Duration::from_millis(10), waiter.as_mut()).await;
        assert!(parked.is_err());

        drop(holder);
        assert_eq!(locks.len(), 1);
        drop(waiter);

        assert_eq!(locks.len(), 0);
    }
}

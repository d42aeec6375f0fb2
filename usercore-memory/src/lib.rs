//! In-memory adapters for `UserCore`
//!
//! This crate provides [`InMemoryUserStore`], the authoritative in-process
//! implementation of the `UserStore` trait, and [`CachingUserStore`], which
//! fronts any other store with a read-through/write-through cache.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use usercore::errors::{StoreError, StoreResult, UniqueField};
use usercore::query::QuerySpec;
use usercore::store::UserStore;
use usercore::types::UserId;
use usercore::user::User;

pub use cache::CachingUserStore;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    // unique indexes, kept in lockstep with `users`
    by_username: HashMap<String, UserId>,
    by_email: HashMap<String, UserId>,
}

impl Tables {
    fn fresh_id(&self) -> UserId {
        let mut id = UserId::new();
        while self.users.contains_key(&id) {
            id = UserId::new();
        }
        id
    }

    fn check_unique(&self, id: UserId, user: &User) -> StoreResult<()> {
        if let Some(holder) = self.by_username.get(user.username()) {
            if *holder != id {
                return Err(StoreError::UniqueViolation {
                    field: UniqueField::Username,
                    value: user.username().to_string(),
                });
            }
        }
        if let Some(holder) = self.by_email.get(user.email()) {
            if *holder != id {
                return Err(StoreError::UniqueViolation {
                    field: UniqueField::Email,
                    value: user.email().to_string(),
                });
            }
        }
        Ok(())
    }

    fn unindex(&mut self, user: &User) {
        self.by_username.remove(user.username());
        self.by_email.remove(user.email());
    }
}

/// Thread-safe in-memory user store.
///
/// A single reader-writer lock guards the map and its unique indexes, so
/// every save and delete is atomic with respect to every other operation.
/// Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryUserStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live users.
    pub fn len(&self) -> usize {
        self.tables.read().users.len()
    }

    /// True when no users are stored.
    pub fn is_empty(&self) -> bool {
        self.tables.read().users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().users.get(id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.read().users.values().cloned().collect())
    }

    async fn save(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write();

        let id = user.id().unwrap_or_else(|| tables.fresh_id());
        tables.check_unique(id, &user)?;

        let stored = user.with_id(id);
        if let Some(previous) = tables.users.insert(id, stored.clone()) {
            tables.unindex(&previous);
        }
        tables
            .by_username
            .insert(stored.username().to_string(), id);
        tables.by_email.insert(stored.email().to_string(), id);

        debug!(user_id = %id, "Saved user");
        Ok(stored)
    }

    async fn delete(&self, id: &UserId) -> StoreResult<bool> {
        let mut tables = self.tables.write();

        let removed = tables.users.remove(id);
        if let Some(previous) = &removed {
            tables.unindex(previous);
        }

        debug!(user_id = %id, removed = removed.is_some(), "Deleted user");
        Ok(removed.is_some())
    }

    async fn query(&self, spec: &QuerySpec) -> StoreResult<Vec<User>> {
        let tables = self.tables.read();
        Ok(spec.apply(tables.users.values().filter(|u| spec.matches(u)).cloned()))
    }
}

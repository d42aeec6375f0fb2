//! The storage port.
//!
//! A [`UserStore`] owns the authoritative mapping from [`UserId`] to
//! [`User`]. Implementations must make every `save` and `delete` atomic with
//! respect to all other operations, must never hand out a partially written
//! user, and must assign identities without collisions under concurrent
//! callers.

use async_trait::async_trait;

use crate::errors::StoreResult;
use crate::query::QuerySpec;
use crate::types::UserId;
use crate::user::User;

/// Keyed collection of users.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Looks up one user. Absence is `Ok(None)`, not an error.
    async fn get(&self, id: &UserId) -> StoreResult<Option<User>>;

    /// Snapshot of every live user, in no particular order.
    async fn list(&self) -> StoreResult<Vec<User>>;

    /// Inserts or fully replaces a user and returns it exactly as stored.
    ///
    /// A user without an identity receives a fresh one. A user with an
    /// identity replaces whatever was stored under it. Implementations
    /// enforce username and email uniqueness and fail with
    /// [`StoreError::UniqueViolation`](crate::errors::StoreError::UniqueViolation).
    async fn save(&self, user: User) -> StoreResult<User>;

    /// Removes a user. Returns whether anything was removed; removing an
    /// absent identity is not an error.
    async fn delete(&self, id: &UserId) -> StoreResult<bool>;

    /// Users matching `spec`, sorted and paged as it describes.
    async fn query(&self, spec: &QuerySpec) -> StoreResult<Vec<User>> {
        Ok(spec.apply(self.list().await?))
    }
}

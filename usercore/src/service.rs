//! The user service: validation, uniqueness and lifecycle over a store.
//!
//! Every mutation follows the same path: check the request, check it
//! against live users, write through the [`UserStore`], then report. Business
//! failures are returned as typed [`UserError`]s and never logged-and-swallowed.
//! Welcome notifications are the one exception: they run on their own task
//! after the write has committed and their failures are only logged.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::config::{NotificationPolicy, ServiceConfig};
use crate::errors::{NotifyError, UniqueField, UserError, UserResult, ValidationErrors};
use crate::locks::IdentityLocks;
use crate::notifier::Notifier;
use crate::query::QuerySpec;
use crate::store::UserStore;
use crate::types::{Timestamp, UserId};
use crate::user::{CreateUser, UpdateUser, User};
use crate::validation::validate_user;

/// Outcome of a successful [`UserService::create`].
#[derive(Debug)]
pub struct Created {
    /// The user exactly as stored.
    pub user: User,
    /// The welcome notification task, when notifications are enabled.
    /// Awaiting it is optional; dropping it does not cancel delivery.
    pub notification: Option<JoinHandle<()>>,
}

impl Created {
    /// Discards the notification handle.
    pub fn into_user(self) -> User {
        self.user
    }
}

/// Create, update, delete and lookup operations over a [`UserStore`].
///
/// Cloning is cheap and clones share the store, notifier and identity locks.
pub struct UserService<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    config: ServiceConfig,
    locks: IdentityLocks,
}

impl<S> Clone for UserService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            config: self.config.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<S> UserService<S>
where
    S: UserStore,
{
    /// Wires a service from its collaborators.
    pub fn new<N>(store: S, notifier: N, config: ServiceConfig) -> Self
    where
        N: Notifier,
    {
        Self {
            store: Arc::new(store),
            notifier: Arc::new(notifier),
            config,
            locks: IdentityLocks::default(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration the service was built with.
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Creates a user.
    ///
    /// Fails with [`UserError::Conflict`] when the username or email is taken
    /// and with [`UserError::Validation`] when a business rule fails; the
    /// store is untouched in both cases. On success a welcome notification is
    /// spawned; its outcome never affects the result.
    #[instrument(
        skip(self, request),
        fields(service = %self.config.service_name, username = %request.username)
    )]
    pub async fn create(&self, request: CreateUser) -> UserResult<Created> {
        info!("Creating new user");

        if self.find_by_username(&request.username).await?.is_some() {
            warn!("Username already exists");
            return Err(UserError::Conflict {
                field: UniqueField::Username,
                value: request.username,
            });
        }

        if self.find_by_email(&request.email).await?.is_some() {
            warn!("Email already exists");
            return Err(UserError::Conflict {
                field: UniqueField::Email,
                value: request.email,
            });
        }

        let user = request.into_user();
        reject_invalid(&user)?;

        let saved = self.store.save(user).await.map_err(|e| {
            warn!(error = %e, "Store rejected new user");
            UserError::from(e)
        })?;

        let notification = self.spawn_welcome(saved.clone());
        info!(user_id = ?saved.id(), "Successfully created user");

        Ok(Created {
            user: saved,
            notification,
        })
    }

    /// Applies the fields present in `request` to an existing user.
    ///
    /// Updates to one identity are serialized: concurrent callers observe
    /// each other's committed writes and never interleave partially.
    #[instrument(skip(self, request), fields(service = %self.config.service_name, user_id = %id))]
    pub async fn update(&self, id: &UserId, request: UpdateUser) -> UserResult<User> {
        let _guard = self.locks.acquire(*id).await;

        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| UserError::user_not_found(*id))?;

        let updated = request.apply_to(&existing);
        reject_invalid(&updated)?;

        if updated.username() != existing.username() {
            self.ensure_unclaimed(*id, UniqueField::Username, updated.username())
                .await?;
        }
        if updated.email() != existing.email() {
            self.ensure_unclaimed(*id, UniqueField::Email, updated.email())
                .await?;
        }

        let saved = self.store.save(updated).await.map_err(|e| {
            error!(error = %e, "Failed to update user");
            UserError::from(e)
        })?;

        info!("Successfully updated user");
        Ok(saved)
    }

    /// Removes a user. Returns whether a user was removed; deleting an
    /// absent identity succeeds.
    ///
    /// Once this future resolves the removal is visible to every later read.
    #[instrument(skip(self), fields(service = %self.config.service_name, user_id = %id))]
    pub async fn delete(&self, id: &UserId) -> UserResult<bool> {
        let _guard = self.locks.acquire(*id).await;

        match self.store.delete(id).await {
            Ok(true) => {
                info!("Successfully deleted user");
                Ok(true)
            }
            Ok(false) => {
                info!("User already absent");
                Ok(false)
            }
            Err(e) => {
                error!(error = %e, "Failed to delete user");
                Err(e.into())
            }
        }
    }

    /// Starts [`delete`](Self::delete) on its own task and returns at once.
    ///
    /// Awaiting the handle observes completion; the removal is visible to
    /// reads issued after that.
    pub fn delete_detached(&self, id: UserId) -> JoinHandle<UserResult<bool>> {
        let service = self.clone();
        tokio::spawn(async move { service.delete(&id).await })
    }

    /// Looks up a user by identity, failing with [`UserError::NotFound`]
    /// when absent.
    #[instrument(skip(self), fields(service = %self.config.service_name, user_id = %id))]
    pub async fn get(&self, id: &UserId) -> UserResult<User> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| UserError::user_not_found(*id))
    }

    /// The user with this exact username, if any.
    #[instrument(skip(self), fields(service = %self.config.service_name))]
    pub async fn find_by_username(&self, username: &str) -> UserResult<Option<User>> {
        let found = self.store.query(&QuerySpec::by_username(username)).await?;
        debug!(found = !found.is_empty(), "Lookup complete");
        Ok(found.into_iter().next())
    }

    /// The user with this exact email, if any.
    #[instrument(skip(self, email), fields(service = %self.config.service_name))]
    pub async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let found = self.store.query(&QuerySpec::by_email(email)).await?;
        debug!(found = !found.is_empty(), "Lookup complete");
        Ok(found.into_iter().next())
    }

    /// Every active user, newest first.
    #[instrument(skip(self), fields(service = %self.config.service_name))]
    pub async fn find_active(&self) -> UserResult<Vec<User>> {
        let mut active: Vec<User> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(User::is_active)
            .collect();
        active.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        debug!(matched = active.len(), "Lookup complete");
        Ok(active)
    }

    /// Active users created within the last `days` days, ordered by username.
    #[instrument(skip(self), fields(service = %self.config.service_name))]
    pub async fn find_recently_active(&self, days: u32) -> UserResult<Vec<User>> {
        let now = Timestamp::now();
        let mut recent: Vec<User> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|u| u.is_active() && u.created_at().is_within_last_days(days, now))
            .collect();
        recent.sort_by(|a, b| a.username().cmp(b.username()));
        debug!(matched = recent.len(), "Lookup complete");
        Ok(recent)
    }

    /// Snapshot of every user.
    #[instrument(skip(self), fields(service = %self.config.service_name))]
    pub async fn find_all(&self) -> UserResult<Vec<User>> {
        let users = self.store.list().await?;
        debug!(matched = users.len(), "Lookup complete");
        Ok(users)
    }

    /// Users matching `spec`.
    #[instrument(skip(self, spec), fields(service = %self.config.service_name))]
    pub async fn search(&self, spec: &QuerySpec) -> UserResult<Vec<User>> {
        let users = self.store.query(spec).await?;
        debug!(matched = users.len(), "Query complete");
        Ok(users)
    }

    async fn ensure_unclaimed(&self, id: UserId, field: UniqueField, value: &str) -> UserResult<()> {
        let holder = match field {
            UniqueField::Username => self.find_by_username(value).await?,
            UniqueField::Email => self.find_by_email(value).await?,
        };
        match holder {
            Some(other) if other.id() != Some(id) => {
                warn!(%field, "Update collides with another user");
                Err(UserError::Conflict {
                    field,
                    value: value.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn spawn_welcome(&self, user: User) -> Option<JoinHandle<()>> {
        if self.config.notifications == NotificationPolicy::Disabled {
            return None;
        }

        let notifier = Arc::clone(&self.notifier);
        let timeout = self.config.notification_timeout;
        let span = info_span!("welcome_notification", user_id = ?user.id());

        Some(tokio::spawn(
            async move {
                let outcome = tokio::time::timeout(timeout.as_duration(), notifier.notify(&user))
                    .await
                    .unwrap_or_else(|_| Err(NotifyError::Timeout(timeout.into())));
                match outcome {
                    Ok(()) => debug!("Welcome notification sent"),
                    Err(e) => error!(error = %e, "Failed to send welcome notification"),
                }
            }
            .instrument(span),
        ))
    }
}

fn reject_invalid(user: &User) -> Result<(), ValidationErrors> {
    match ValidationErrors::from_messages(validate_user(user)) {
        Some(errors) => {
            warn!(errors = %errors, "Validation failed");
            Err(errors)
        }
        None => Ok(()),
    }
}

//! The user entity and the requests that create or change one.
//!
//! `User` is an immutable value: every change goes through a `with_*` method
//! or [`UpdateUser::apply_to`] and yields a new value carrying the same
//! identity. The bare constructor performs no business validation so that
//! structurally complete but invalid users can be built; use
//! [`User::validated`] when the rules must hold.

use serde::{Deserialize, Serialize};

use crate::errors::ValidationErrors;
use crate::types::{Timestamp, UserId};
use crate::validation::validate_user;

/// A stored or storable user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: Option<UserId>,
    username: String,
    email: String,
    display_name: Option<String>,
    created_at: Timestamp,
    active: bool,
}

impl User {
    /// Builds an active user with no identity, created now.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: email.into(),
            display_name: None,
            created_at: Timestamp::now(),
            active: true,
        }
    }

    /// Builds a user like [`User::new`] and runs the business rules on it.
    pub fn validated(
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, ValidationErrors> {
        let user = Self::new(username, email);
        match ValidationErrors::from_messages(validate_user(&user)) {
            Some(errors) => Err(errors),
            None => Ok(user),
        }
    }

    /// The identity, once a store has assigned one.
    pub const fn id(&self) -> Option<UserId> {
        self.id
    }

    /// The login name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The contact address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// The optional human-readable name.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// When the user was first created.
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Whether the account is active.
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Copy with the given identity and every other field unchanged.
    #[must_use]
    pub fn with_id(self, id: UserId) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    /// Copy with a different creation time. Used when importing users and in
    /// tests that need a known ordering.
    #[must_use]
    pub fn with_created_at(self, created_at: Timestamp) -> Self {
        Self { created_at, ..self }
    }

    /// Copy with a display name.
    #[must_use]
    pub fn with_display_name(self, display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            ..self
        }
    }

    /// Copy with the active flag set.
    #[must_use]
    pub fn with_active(self, active: bool) -> Self {
        Self { active, ..self }
    }
}

/// Request to create a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUser {
    /// Requested login name
    pub username: String,
    /// Requested contact address
    pub email: String,
    /// Optional human-readable name
    pub display_name: Option<String>,
}

impl CreateUser {
    /// Request with the two required fields.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            display_name: None,
        }
    }

    /// Adds a display name to the request.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub(crate) fn into_user(self) -> User {
        let user = User::new(self.username, self.email);
        match self.display_name {
            Some(name) => user.with_display_name(name),
            None => user,
        }
    }
}

/// Partial update: only the fields that are `Some` change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUser {
    /// New login name
    pub username: Option<String>,
    /// New contact address
    pub email: Option<String>,
    /// New display name
    pub display_name: Option<String>,
    /// New active flag
    pub active: Option<bool>,
}

impl UpdateUser {
    /// Update that changes the username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Update that changes the email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Update that changes the display name.
    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Update that changes the active flag.
    #[must_use]
    pub const fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Merges the present fields onto `existing`. Identity and creation time
    /// always carry over.
    pub fn apply_to(&self, existing: &User) -> User {
        User {
            id: existing.id,
            username: self
                .username
                .clone()
                .unwrap_or_else(|| existing.username.clone()),
            email: self.email.clone().unwrap_or_else(|| existing.email.clone()),
            display_name: self
                .display_name
                .clone()
                .or_else(|| existing.display_name.clone()),
            created_at: existing.created_at,
            active: self.active.unwrap_or(existing.active),
        }
    }
}

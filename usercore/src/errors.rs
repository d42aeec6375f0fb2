//! Error types for the user core.
//!
//! The taxonomy separates what a caller can act on from what only an
//! operator can fix:
//!
//! - **UserError**: returned by every [`UserService`](crate::service::UserService)
//!   operation. Business-rule and not-found failures always reach the caller.
//! - **StoreError**: failures raised by a [`UserStore`](crate::store::UserStore)
//!   implementation or the backend behind it.
//! - **QueryError**: a [`QueryBuilder`](crate::query::QueryBuilder) could not
//!   produce a coherent query.
//! - **NotifyError**: a notifier failed. These are logged, never propagated.
//! - **ConfigError**: configuration could not be loaded.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! match service.create(request).await {
//!     Ok(created) => println!("created {}", created.user.username),
//!     Err(UserError::Conflict { field, .. }) => println!("{field} taken"),
//!     Err(UserError::Validation(errors)) => {
//!         for message in errors.messages() {
//!             println!("{message}");
//!         }
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::UserId;

/// A field that must be unique across all live users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniqueField {
    /// The login name.
    Username,
    /// The contact address.
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username => f.write_str("Username"),
            Self::Email => f.write_str("Email"),
        }
    }
}

/// One or more business-rule violations, in the order the rules ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    /// Wraps the collected messages. Returns `None` when there is nothing to
    /// report, so a `ValidationErrors` value is never empty.
    pub fn from_messages(messages: Vec<String>) -> Option<Self> {
        if messages.is_empty() {
            None
        } else {
            Some(Self(messages))
        }
    }

    /// The individual messages.
    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Errors surfaced by the user service.
///
/// # Error Handling Strategy
///
/// - **Validation**: fix the input and resubmit
/// - **NotFound**: the identity is stale or was never issued
/// - **Conflict**: pick a different username or email
/// - **Store**: the backing store failed; retry policy belongs to the caller
#[derive(Debug, Error)]
pub enum UserError {
    /// The request broke one or more business rules. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// No live entity has the requested identity.
    #[error("{kind} with id {id} not found")]
    NotFound {
        /// The entity kind, for diagnostics
        kind: &'static str,
        /// The identity that was looked up
        id: UserId,
    },

    /// A unique field is already taken by another live user.
    #[error("{field} '{value}' already exists")]
    Conflict {
        /// Which unique field collided
        field: UniqueField,
        /// The colliding value
        value: String,
    },

    /// The store failed while serving the request.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl UserError {
    /// Convenience constructor for a missing user.
    pub const fn user_not_found(id: UserId) -> Self {
        Self::NotFound { kind: "User", id }
    }

    /// The validation messages, if this is a validation failure.
    pub fn validation_messages(&self) -> Option<&[String]> {
        match self {
            Self::Validation(errors) => Some(errors.messages()),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for UserError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for UserError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UniqueViolation { field, value } => Self::Conflict { field, value },
            other => Self::Store(other),
        }
    }
}

/// Errors raised by a store implementation.
///
/// # Common Scenarios
///
/// - **UniqueViolation**: a concurrent writer claimed the same username or
///   email between the service's check and the write
/// - **Unavailable**: the persistence backend could not be reached
/// - **Internal**: the backend returned something it should not have
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The write would give two live users the same unique value.
    #[error("Unique constraint violated: {field} '{value}' already exists")]
    UniqueViolation {
        /// Which unique field collided
        field: UniqueField,
        /// The colliding value
        value: String,
    },

    /// The backend could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The backend failed in an unexpected way.
    #[error("Internal store error: {0}")]
    Internal(String),
}

/// The query builder was given contradictory or unknown input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The creation-time window is empty.
    #[error("Created-after bound must be earlier than created-before bound")]
    EmptyTimeWindow,

    /// The sort field name is not recognised.
    #[error("Unknown sort field: {0}")]
    UnknownSortField(String),

    /// The sort direction name is not recognised.
    #[error("Unknown sort direction: {0}")]
    UnknownSortDirection(String),
}

/// A notifier could not deliver its message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Delivery was attempted and failed.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    /// Delivery did not finish within the configured timeout.
    #[error("Notification timed out after {0}ms")]
    Timeout(u64),
}

/// Configuration could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A configuration value failed to parse or validate.
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue {
        /// The configuration key
        key: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Result type for service operations.
pub type UserResult<T> = Result<T, UserError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

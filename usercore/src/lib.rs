//! `UserCore` - validated, query-filterable user store and service
//!
//! The crate defines the user entity and its business rules, an immutable
//! query descriptor, the storage and notification ports, and the
//! [`UserService`] that composes them into create, update, delete and
//! lookup operations with a typed error taxonomy.
//!
//! Storage adapters live in separate crates; `usercore-memory` provides the
//! in-memory store and a read-through/write-through cache.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod errors;
mod locks;
pub mod notifier;
pub mod query;
pub mod service;
pub mod store;
pub mod types;
pub mod user;
pub mod validation;

pub use config::{NotificationPolicy, NotificationTimeoutMs, ServiceConfig, ServiceName};
pub use errors::{
    ConfigError, NotifyError, QueryError, StoreError, StoreResult, UniqueField, UserError,
    UserResult, ValidationErrors,
};
pub use notifier::{LoggingNotifier, NoopNotifier, Notifier};
pub use query::{QueryBuilder, QuerySpec, SortDirection, SortField};
pub use service::{Created, UserService};
pub use store::UserStore;
pub use types::{Timestamp, UserId};
pub use user::{CreateUser, UpdateUser, User};
pub use validation::{normalize_emails, validate_user};

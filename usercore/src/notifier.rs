//! Outbound notifications sent after a user is created.
//!
//! Notifiers are best effort. The service runs them off the caller's path
//! and only logs their failures.

use async_trait::async_trait;
use tracing::info;

use crate::errors::NotifyError;
use crate::user::User;

/// Delivers a message about a newly created user.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Sends the welcome message for `user`.
    async fn notify(&self, user: &User) -> Result<(), NotifyError>;
}

/// Notifier that records the welcome message in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, user: &User) -> Result<(), NotifyError> {
        info!(
            username = user.username(),
            email = user.email(),
            "Sending welcome message"
        );
        Ok(())
    }
}

/// Notifier that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _user: &User) -> Result<(), NotifyError> {
        Ok(())
    }
}

//! Service configuration with type-safe validation.
//!
//! Every tunable is a validated newtype so an out-of-range value is rejected
//! when the configuration is built rather than when the service runs.

use std::time::Duration;

use nutype::nutype;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Environment variable naming the service in logs.
pub const ENV_SERVICE_NAME: &str = "USERCORE_SERVICE_NAME";
/// Environment variable switching welcome notifications `on` or `off`.
pub const ENV_NOTIFICATIONS: &str = "USERCORE_NOTIFICATIONS";
/// Environment variable bounding each notification, in milliseconds.
pub const ENV_NOTIFICATION_TIMEOUT_MS: &str = "USERCORE_NOTIFICATION_TIMEOUT_MS";

/// Name the service reports in its tracing spans.
///
/// Trimmed, non-empty and at most 64 characters.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct ServiceName(String);

impl Default for ServiceName {
    fn default() -> Self {
        Self::try_new("user-service").expect("default service name is valid")
    }
}

/// Upper bound on a single notification attempt, in milliseconds.
///
/// Validated to be between 10ms and 60 seconds.
#[nutype(
    validate(greater_or_equal = 10, less_or_equal = 60_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct NotificationTimeoutMs(u64);

impl NotificationTimeoutMs {
    /// Convert to Duration for use with `tokio::time::timeout`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

impl Default for NotificationTimeoutMs {
    fn default() -> Self {
        Self::try_new(30_000).expect("default notification timeout is valid")
    }
}

/// Whether `create` sends a welcome notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotificationPolicy {
    /// Send one notification per successful create.
    #[default]
    Enabled,
    /// Never notify.
    Disabled,
}

/// Configuration passed to [`UserService::new`](crate::service::UserService::new).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Name recorded on every span the service emits.
    pub service_name: ServiceName,
    /// Whether welcome notifications are sent.
    pub notifications: NotificationPolicy,
    /// Bound on each notification attempt.
    pub notification_timeout: NotificationTimeoutMs,
}

impl ServiceConfig {
    /// Sets the service name.
    #[must_use]
    pub fn with_service_name(mut self, name: ServiceName) -> Self {
        self.service_name = name;
        self
    }

    /// Sets the notification policy.
    #[must_use]
    pub const fn with_notifications(mut self, policy: NotificationPolicy) -> Self {
        self.notifications = policy;
        self
    }

    /// Sets the notification timeout.
    #[must_use]
    pub const fn with_notification_timeout(mut self, timeout: NotificationTimeoutMs) -> Self {
        self.notification_timeout = timeout;
        self
    }

    /// Loads configuration from the process environment, falling back to
    /// defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_SERVICE_NAME) {
            config.service_name =
                ServiceName::try_new(name).map_err(|e| ConfigError::InvalidValue {
                    key: ENV_SERVICE_NAME,
                    reason: e.to_string(),
                })?;
        }

        if let Some(value) = lookup(ENV_NOTIFICATIONS) {
            config.notifications = match value.trim().to_ascii_lowercase().as_str() {
                "on" | "true" | "enabled" => NotificationPolicy::Enabled,
                "off" | "false" | "disabled" => NotificationPolicy::Disabled,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_NOTIFICATIONS,
                        reason: format!("expected on or off, got '{other}'"),
                    })
                }
            };
        }

        if let Some(value) = lookup(ENV_NOTIFICATION_TIMEOUT_MS) {
            let millis: u64 = value
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    key: ENV_NOTIFICATION_TIMEOUT_MS,
                    reason: e.to_string(),
                })?;
            config.notification_timeout =
                NotificationTimeoutMs::try_new(millis).map_err(|e| ConfigError::InvalidValue {
                    key: ENV_NOTIFICATION_TIMEOUT_MS,
                    reason: e.to_string(),
                })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ServiceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.service_name.as_ref(), "user-service");
        assert_eq!(config.notifications, NotificationPolicy::Enabled);
        assert_eq!(
            config.notification_timeout.as_duration(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn reads_every_variable() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            (ENV_SERVICE_NAME, "  accounts  "),
            (ENV_NOTIFICATIONS, "off"),
            (ENV_NOTIFICATION_TIMEOUT_MS, "250"),
        ]))
        .unwrap();

        assert_eq!(config.service_name.as_ref(), "accounts");
        assert_eq!(config.notifications, NotificationPolicy::Disabled);
        assert_eq!(
            config.notification_timeout.as_duration(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let result =
            ServiceConfig::from_lookup(lookup_from(&[(ENV_NOTIFICATION_TIMEOUT_MS, "5")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                key: ENV_NOTIFICATION_TIMEOUT_MS,
                ..
            })
        ));
    }

    #[test]
    fn rejects_unparseable_values() {
        assert!(ServiceConfig::from_lookup(lookup_from(&[(ENV_NOTIFICATIONS, "maybe")])).is_err());
        assert!(
            ServiceConfig::from_lookup(lookup_from(&[(ENV_NOTIFICATION_TIMEOUT_MS, "soon")]))
                .is_err()
        );
        assert!(ServiceConfig::from_lookup(lookup_from(&[(ENV_SERVICE_NAME, "   ")])).is_err());
    }

    #[test]
    fn builders_override_fields() {
        let config = ServiceConfig::default()
            .with_service_name(ServiceName::try_new("directory").unwrap())
            .with_notifications(NotificationPolicy::Disabled)
            .with_notification_timeout(NotificationTimeoutMs::try_new(10).unwrap());

        assert_eq!(config.service_name.as_ref(), "directory");
        assert_eq!(config.notifications, NotificationPolicy::Disabled);
        assert_eq!(
            config.notification_timeout.as_duration(),
            Duration::from_millis(10)
        );
    }
}

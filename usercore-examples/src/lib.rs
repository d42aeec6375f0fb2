//! Example programs using the `UserCore` service
//!
//! Shared setup for the examples: seed data and logging.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use tracing_subscriber::EnvFilter;
use usercore::CreateUser;

/// The users the directory example starts with.
pub fn seed_users() -> Vec<CreateUser> {
    vec![
        CreateUser::new("john_doe", "john@example.com").with_display_name("John Doe"),
        CreateUser::new("jane_smith", "jane@example.com").with_display_name("Jane Smith"),
        CreateUser::new("bob_wilson", "bob@example.com"),
    ]
}

/// Installs a formatting subscriber filtered by `RUST_LOG`, defaulting to
/// `info`.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

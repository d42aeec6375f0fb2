//! User directory example
//!
//! Builds a service over the in-memory store, creates the seed users
//! concurrently, then walks through lookups, a paged query, an update, a
//! rejected duplicate and a delete, printing status as it goes.

use anyhow::Result;
use futures::future::join_all;
use tracing::{error, info};
use usercore::{
    CreateUser, LoggingNotifier, QueryBuilder, ServiceConfig, SortDirection, SortField,
    UpdateUser, UserError, UserService,
};
use usercore_examples::{init_tracing, seed_users};
use usercore_memory::InMemoryUserStore;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = ServiceConfig::from_env()?;
    info!(service = %config.service_name, "Starting user directory");

    let service = UserService::new(InMemoryUserStore::new(), LoggingNotifier, config);

    let outcomes = join_all(seed_users().into_iter().map(|request| {
        let service = service.clone();
        async move {
            let username = request.username.clone();
            (username, service.create(request).await)
        }
    }))
    .await;

    let mut notifications = Vec::new();
    let mut failures = 0;
    for (username, outcome) in outcomes {
        match outcome {
            Ok(created) => {
                info!(%username, user_id = ?created.user.id(), "User created");
                notifications.extend(created.notification);
            }
            Err(e) => {
                error!(%username, error = %e, "Failed to create user");
                failures += 1;
            }
        }
    }
    // let the welcome messages land before printing
    for notification in notifications {
        notification.await?;
    }

    if failures > 0 {
        eprintln!("Application startup failed!");
        anyhow::bail!("{failures} seed users could not be created");
    }
    info!("All users created successfully");
    println!("Application started successfully!");

    let Some(john) = service.find_by_username("john_doe").await? else {
        anyhow::bail!("john_doe missing after seeding");
    };
    let john_id = john
        .id()
        .ok_or_else(|| anyhow::anyhow!("stored user without identity"))?;
    println!("{}", serde_json::to_string_pretty(&john)?);

    match service
        .create(CreateUser::new("john_doe", "someone@example.com"))
        .await
    {
        Err(e @ UserError::Conflict { .. }) => println!("Duplicate rejected: {e}"),
        Err(e) => return Err(e.into()),
        Ok(_) => anyhow::bail!("duplicate username was accepted"),
    }

    let deactivated = service
        .update(&john_id, UpdateUser::default().active(false))
        .await?;
    println!(
        "{} is now {}",
        deactivated.username(),
        if deactivated.is_active() { "active" } else { "inactive" }
    );

    let page = QueryBuilder::new()
        .active(true)
        .sort_by(SortField::Username, SortDirection::Ascending)
        .limit(10)
        .build()?;
    for user in service.search(&page).await? {
        println!("active: {} <{}>", user.username(), user.email());
    }

    service.delete(&john_id).await?;
    println!(
        "{} users remain after deleting john_doe",
        service.find_all().await?.len()
    );

    info!("User directory example completed successfully");
    Ok(())
}

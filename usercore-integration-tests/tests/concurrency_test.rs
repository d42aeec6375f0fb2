//! Concurrent callers against one service.
//!
//! These tests run on the multi-threaded runtime so that tasks genuinely
//! race rather than interleave at await points only.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use usercore::{
    CreateUser, NoopNotifier, ServiceConfig, UpdateUser, User, UserError, UserService, UserStore,
};
use usercore_integration_tests::{quiet_service, RecordingStore};
use usercore_memory::InMemoryUserStore;

const CALLERS: usize = 50;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn parallel_saves_without_identity_never_collide() {
    let store = InMemoryUserStore::new();

    let tasks = (0..CALLERS).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .save(User::new(format!("user_{i}"), format!("user_{i}@example.com")))
                .await
        })
    });

    let ids: HashSet<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().id().unwrap())
        .collect();

    assert_eq!(ids.len(), CALLERS);
    assert_eq!(store.len(), CALLERS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn parallel_creates_with_distinct_names_all_succeed() {
    let service = quiet_service();

    let tasks = (0..CALLERS).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create(CreateUser::new(
                    format!("user_{i}"),
                    format!("user_{i}@example.com"),
                ))
                .await
        })
    });

    let ids: HashSet<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().user.id().unwrap())
        .collect();

    assert_eq!(ids.len(), CALLERS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_creates_for_one_username_admit_exactly_one() {
    let service = quiet_service();

    let tasks = (0..CALLERS).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create(CreateUser::new("john_doe", format!("john_{i}@example.com")))
                .await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(UserError::Conflict { .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(conflicts, CALLERS - 1);
    assert_eq!(service.store().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn updates_to_one_identity_never_overlap() {
    let store = RecordingStore::with_write_delay(Duration::from_millis(1));
    let service = UserService::new(store, NoopNotifier, ServiceConfig::default());
    let id = service
        .create(CreateUser::new("john_doe", "john@example.com"))
        .await
        .unwrap()
        .user
        .id()
        .unwrap();

    let tasks = (0..20).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .update(&id, UpdateUser::default().display_name(format!("name {i}")))
                .await
        })
    });
    let committed: Vec<String> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| {
            joined
                .unwrap()
                .unwrap()
                .display_name()
                .unwrap()
                .to_string()
        })
        .collect();

    assert_eq!(service.store().max_overlap(), 1);
    let last = service.get(&id).await.unwrap();
    assert!(committed.contains(&last.display_name().unwrap().to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn updates_to_different_identities_proceed_independently() {
    let service = quiet_service();
    let mut ids = Vec::new();
    for i in 0..10 {
        let created = service
            .create(CreateUser::new(format!("user_{i}"), format!("user_{i}@example.com")))
            .await
            .unwrap();
        ids.push(created.user.id().unwrap());
    }

    let tasks = ids.iter().copied().map(|id| {
        let service = service.clone();
        tokio::spawn(async move { service.update(&id, UpdateUser::default().active(false)).await })
    });
    for joined in join_all(tasks).await {
        assert!(!joined.unwrap().unwrap().is_active());
    }

    assert!(service.find_active().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn delete_racing_update_never_resurrects() {
    for round in 0..20 {
        let service = quiet_service();
        let id = service
            .create(CreateUser::new(
                format!("user_{round}"),
                format!("user_{round}@example.com"),
            ))
            .await
            .unwrap()
            .user
            .id()
            .unwrap();

        let updater = {
            let service = service.clone();
            tokio::spawn(async move { service.update(&id, UpdateUser::default().active(false)).await })
        };
        let deleter = service.delete_detached(id);

        let (update, delete) = (updater.await.unwrap(), deleter.await.unwrap());

        assert!(delete.unwrap());
        assert!(matches!(update, Ok(_) | Err(UserError::NotFound { .. })));
        assert_eq!(service.store().get(&id).await.unwrap(), None);
    }
}

//! Unit tests for mini-service pools and status aggregation

use crate::test_utils::{Profile, Script, Webhook, WebhookManager};
use notifyr_domain::build::BuildToken;
use notifyr_domain::error::Error;
use notifyr_domain::status::ComponentStatus;
use notifyr_runtime::{ComponentCell, MiniServiceStore, StatusCounter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

fn profiles() -> Vec<Profile> {
    vec![
        Profile::new("p1", Script::Ok).secure(),
        Profile::new("p2", Script::Failure),
        Profile::new("p3", Script::Warning),
        Profile::new("p4", Script::Abort),
        Profile::new("p5", Script::Ok),
    ]
}

async fn built_manager(profiles: Vec<Profile>) -> Arc<ComponentCell<WebhookManager>> {
    let cell = ComponentCell::new("webhooks", WebhookManager::new("webhooks", profiles));
    cell.build(BuildToken::BOOT).await.unwrap();
    cell
}

#[tokio::test]
async fn test_failed_minis_are_omitted() {
    let cell = built_manager(profiles()).await;

    let guard = cell.guard().read().await;
    let pool = &guard.component().pool;
    assert_eq!(pool.len(), 3);
    assert_eq!(pool.ids(), ["p1", "p3", "p5"]);
    assert!(!pool.contains("p2"));
    assert!(!pool.contains("p4"));
    assert_eq!(pool.filter_count(|_| true), 3);
    assert_eq!(pool.filter_count(|e| e.entity().secure), 1);
}

/// The manager takes the worst status among survivors
#[tokio::test]
async fn test_manager_status_is_worst_survivor() {
    let cell = built_manager(profiles()).await;
    assert_eq!(cell.status().await, ComponentStatus::Degraded);

    let cell = built_manager(vec![
        Profile::new("p1", Script::Ok),
        Profile::new("p2", Script::Failure),
    ])
    .await;
    assert_eq!(cell.status().await, ComponentStatus::Available);
}

#[tokio::test]
async fn test_no_survivor_makes_manager_unavailable() {
    let cell = built_manager(vec![
        Profile::new("p1", Script::Failure),
        Profile::new("p2", Script::Abort),
    ])
    .await;
    assert_eq!(cell.status().await, ComponentStatus::Unavailable);
    assert!(cell.gate("dispatch").await.is_err());
}

#[tokio::test]
async fn test_no_entities_keeps_manager_available() {
    let cell = built_manager(Vec::new()).await;
    assert_eq!(cell.status().await, ComponentStatus::Available);
    assert_eq!(cell.snapshot().await.mini_services, Some(0));
}

#[tokio::test]
async fn test_snapshot_reports_pool_size() {
    let cell = built_manager(profiles()).await;
    let snapshot = cell.snapshot().await;
    assert_eq!(snapshot.mini_services, Some(3));
    assert_eq!(snapshot.status, ComponentStatus::Degraded);
}

#[tokio::test]
async fn test_lookup_errors() {
    let cell = built_manager(profiles()).await;
    let guard = cell.guard().read().await;
    let pool = &guard.component().pool;

    let webhook = pool.get("p1").unwrap();
    assert_eq!(webhook.gate("deliver").await.unwrap().target(), "https://hooks.example/p1");

    match pool.get("p2") {
        Err(Error::MiniServiceNotFound { manager, id }) => {
            assert_eq!(manager, "webhooks");
            assert_eq!(id, "p2");
        }
        other => panic!("expected not found, got {:?}", other.map(|c| c.name().to_string())),
    }
}

#[tokio::test]
async fn test_duplicate_add_rejected() {
    let mut pool: MiniServiceStore<Webhook> = MiniServiceStore::new("webhooks");
    let teardowns = Arc::new(AtomicU32::new(0));
    let make = |id: &str| {
        let profile = Profile::new(id, Script::Ok);
        ComponentCell::new(id, Webhook::new(&profile, &teardowns))
    };
    pool.add(make("p1"), Profile::new("p1", Script::Ok)).unwrap();
    let err = pool
        .add(make("p1"), Profile::new("p1", Script::Ok))
        .unwrap_err();
    assert!(matches!(err, Error::MiniServiceAlreadyExists { id, .. } if id == "p1"));
    assert_eq!(pool.len(), 1);

    assert!(pool.remove("p1").is_some());
    assert!(pool.is_empty());
    assert!(pool.remove("p1").is_none());
}

/// Every pass starts from an empty pool; evicted minis are destroyed
#[tokio::test]
async fn test_rebuild_repopulates_pool() {
    let manager = WebhookManager::new("webhooks", profiles());
    let source = Arc::clone(&manager.profiles);
    let cell = ComponentCell::new("webhooks", manager);
    cell.build(BuildToken::BOOT).await.unwrap();

    let evicted = cell.guard().read().await.component().pool.get("p1").unwrap();

    *source.lock().unwrap() = vec![
        Profile::new("p2", Script::Ok),
        Profile::new("p6", Script::Ok),
    ];
    cell.build(BuildToken::ADMIN).await.unwrap();

    assert!(evicted.snapshot().await.destroyed);
    let guard = cell.guard().read().await;
    assert_eq!(guard.component().pool.ids(), ["p2", "p6"]);
    drop(guard);
    assert_eq!(cell.status().await, ComponentStatus::Available);
}

/// Failed, aborted and clashing minis are torn down before being dropped
#[tokio::test]
async fn test_omitted_minis_are_destroyed() {
    let manager = WebhookManager::new(
        "webhooks",
        vec![
            Profile::new("p1", Script::Ok),
            Profile::new("p2", Script::Failure),
            Profile::new("p3", Script::Abort),
            Profile::new("p1", Script::Ok),
        ],
    );
    let teardowns = Arc::clone(&manager.teardowns);
    let cell = ComponentCell::new("webhooks", manager);
    cell.build(BuildToken::BOOT).await.unwrap();

    assert_eq!(teardowns.load(Ordering::SeqCst), 3);
    let guard = cell.guard().read().await;
    assert_eq!(guard.component().pool.ids(), ["p1"]);
    assert!(!guard.component().pool.get("p1").unwrap().snapshot().await.destroyed);
}

#[tokio::test]
async fn test_manager_destroy_tears_down_pool() {
    let cell = built_manager(vec![
        Profile::new("p1", Script::Ok),
        Profile::new("p2", Script::Failure),
        Profile::new("p3", Script::Warning),
    ])
    .await;
    let pooled = cell.guard().read().await.component().pool.get("p3").unwrap();
    assert_eq!(cell.guard().read().await.component().teardown_count(), 1);

    cell.destroy().await;

    let guard = cell.guard().read().await;
    assert_eq!(guard.component().teardown_count(), 3);
    assert!(guard.component().pool.is_empty());
    drop(guard);
    assert!(pooled.snapshot().await.destroyed);
}

#[tokio::test]
async fn test_destroy_all_empties_pool() {
    let mut pool: MiniServiceStore<Webhook> = MiniServiceStore::new("webhooks");
    let teardowns = Arc::new(AtomicU32::new(0));
    for id in ["p1", "p2"] {
        let profile = Profile::new(id, Script::Ok);
        let webhook = ComponentCell::new(id, Webhook::new(&profile, &teardowns));
        pool.add(webhook, profile).unwrap();
    }

    assert_eq!(pool.destroy_all().await, 2);
    assert!(pool.is_empty());
    assert_eq!(teardowns.load(Ordering::SeqCst), 2);
    assert_eq!(pool.destroy_all().await, 0);
}

/// A transient outage keeps the mini pooled and shows in the aggregate
#[tokio::test]
async fn test_temporarily_unavailable_mini_is_kept() {
    let cell = built_manager(vec![
        Profile::new("p1", Script::Ok),
        Profile::new("p2", Script::Ok).reporting(ComponentStatus::TemporarilyUnavailable),
        Profile::new("p3", Script::Warning),
    ])
    .await;

    assert_eq!(cell.status().await, ComponentStatus::TemporarilyUnavailable);
    let guard = cell.guard().read().await;
    let pool = &guard.component().pool;
    assert_eq!(pool.ids(), ["p1", "p2", "p3"]);
    let err = pool.get("p2").unwrap().gate("deliver").await.err().unwrap();
    assert!(err.is_retryable());
    assert_eq!(guard.component().teardown_count(), 0);
}

#[tokio::test]
async fn test_single_mini_rebuild() {
    let cell = built_manager(profiles()).await;
    let guard = cell.guard().read().await;
    let report = guard
        .component()
        .pool
        .rebuild("p3", BuildToken::ADMIN)
        .await
        .unwrap();
    assert_eq!(report.token, BuildToken::ADMIN);
    assert_eq!(report.status, ComponentStatus::Degraded);
}

#[test]
fn test_counter_tracks_survivors() {
    let mut counter = StatusCounter::new(5);
    counter.record(ComponentStatus::Available);
    counter.record(ComponentStatus::Degraded);
    counter.record(ComponentStatus::Available);
    counter.omit();
    counter.omit();

    assert_eq!(counter.built(), 3);
    assert_eq!(counter.omitted(), 2);
    assert_eq!(counter.count(ComponentStatus::Available), 2);
    assert_eq!(counter.status(), ComponentStatus::Degraded);
}

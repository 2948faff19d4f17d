//! End-to-end batch migration behavior over an in-memory store

use std::sync::Arc;
use std::time::Duration;
use svm_core::{ItemStatus, MigrationConfig, MigrationError, MigrationOrchestrator, TaskStatus};
use svm_test_utils::{alpha_resource, platform_graph, seed_store, wait_terminal, MemoryStore};

fn orchestrator(store: Arc<MemoryStore>, config: MigrationConfig) -> MigrationOrchestrator {
    MigrationOrchestrator::new(platform_graph(), store, config).unwrap()
}

fn fast_config() -> MigrationConfig {
    MigrationConfig::new()
        .with_retry_delay(Duration::from_millis(5))
        .with_backup(false)
}

#[tokio::test]
async fn batch_completes_with_transient_retries() {
    svm_test_utils::init_tracing();
    let store = MemoryStore::new();
    let keys = seed_store(&store, 10);
    store.fail_next_updates(&keys[3], 2);

    let orchestrator = orchestrator(
        Arc::clone(&store),
        fast_config().with_max_concurrency(3).with_retry_attempts(3),
    );
    let task = orchestrator.migrate_batch(keys.clone(), "v1");
    let done = wait_terminal(&orchestrator, task.id).await;

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.progress.migrated, 10);
    assert_eq!(done.progress.failed, 0);
    assert!(done.progress.is_drained());

    let retried = done.items.iter().find(|i| i.resource == keys[3]).unwrap();
    assert_eq!(retried.status, ItemStatus::Succeeded);
    assert_eq!(retried.attempts, 3);

    for key in &keys {
        assert_eq!(store.stored(key).unwrap().api_version, "v1");
    }

    let analytics = orchestrator.history().analytics();
    assert_eq!(analytics.succeeded, 10);
    assert_eq!(analytics.failed, 2);
    assert_eq!(analytics.by_path.get("v1alpha1 -> v1"), Some(&12));
}

#[tokio::test]
async fn exhausted_retries_fail_only_that_item() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 4);
    store.fail_next_updates(&keys[0], 10);

    let orchestrator = orchestrator(Arc::clone(&store), fast_config().with_retry_attempts(2));
    let task = orchestrator.migrate_batch(keys.clone(), "v1beta1");
    let done = wait_terminal(&orchestrator, task.id).await;

    // Mixed item outcomes still complete the task
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.progress.migrated, 3);
    assert_eq!(done.progress.failed, 1);

    let failed = done.items.iter().find(|i| i.resource == keys[0]).unwrap();
    assert_eq!(failed.status, ItemStatus::Failed);
    assert_eq!(failed.attempts, 2);
    assert!(failed.error.as_deref().unwrap().contains("transient"));

    // The failed resource keeps its prior version
    assert_eq!(store.stored(&keys[0]).unwrap().api_version, "v1alpha1");
}

#[tokio::test]
async fn resources_at_target_are_skipped_without_writes() {
    let store = MemoryStore::new();
    let mut resource = alpha_resource("settled");
    resource.api_version = "v1".to_string();
    let key = resource.key.clone();
    store.insert(resource);

    let orchestrator = orchestrator(Arc::clone(&store), fast_config());
    let task = orchestrator.migrate_resource(key, "v1").await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.items[0].status, ItemStatus::Skipped);
    assert_eq!(task.progress.skipped, 1);
    assert_eq!(store.update_calls(), 0);
}

#[tokio::test]
async fn rename_is_applied_along_the_path() {
    let store = MemoryStore::new();
    let resource = alpha_resource("renamed");
    let key = resource.key.clone();
    store.insert(resource);

    let orchestrator = orchestrator(Arc::clone(&store), fast_config());
    orchestrator
        .migrate_resource(key.clone(), "v1beta1")
        .await
        .unwrap();

    let stored = store.stored(&key).unwrap();
    assert_eq!(stored.api_version, "v1beta1");
    assert!(stored.field("monitoring").is_none());
    assert_eq!(
        stored.field("observability.retention").unwrap(),
        &serde_json::json!("30d")
    );
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 3);

    let orchestrator = orchestrator(Arc::clone(&store), fast_config().with_dry_run(true));
    let task = orchestrator.migrate_batch(keys.clone(), "v1beta1");
    let done = wait_terminal(&orchestrator, task.id).await;

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.progress.migrated, 3);
    assert_eq!(store.update_calls(), 0);
    assert_eq!(store.stored(&keys[0]).unwrap().api_version, "v1alpha1");
}

#[tokio::test]
async fn backups_are_taken_before_writes() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 2);

    let orchestrator = orchestrator(
        Arc::clone(&store),
        MigrationConfig::new().with_retry_delay(Duration::from_millis(5)),
    );
    let task = orchestrator.migrate_batch(keys, "v1beta1");
    wait_terminal(&orchestrator, task.id).await;

    let backups = store.backups();
    assert_eq!(backups.len(), 2);
    // Backups carry the pre-conversion form
    assert!(backups.iter().all(|r| r.api_version == "v1alpha1"));
}

#[tokio::test]
async fn unregistered_target_fails_the_whole_task() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 2);

    let orchestrator = orchestrator(Arc::clone(&store), fast_config());
    let task = orchestrator.migrate_batch(keys, "v9");
    let done = wait_terminal(&orchestrator, task.id).await;

    assert_eq!(done.status, TaskStatus::Failed);
    assert!(done.error.as_deref().unwrap().contains("v9"));
    assert!(done.items.iter().all(|i| i.status == ItemStatus::Failed));
    assert!(done.progress.is_drained());
    assert_eq!(store.update_calls(), 0);
}

#[tokio::test]
async fn migrate_resource_surfaces_failures_as_errors() {
    let store = MemoryStore::new();
    let mut settled = alpha_resource("settled");
    settled.api_version = "v1".to_string();
    let key = settled.key.clone();
    store.insert(settled);

    let orchestrator = orchestrator(Arc::clone(&store), fast_config());

    // Unregistered target aborts the task
    let err = orchestrator
        .migrate_resource(key.clone(), "v9")
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::TaskFailed(_)));

    // Registered but unreachable target fails the item: no edge leaves v1
    let err = orchestrator
        .migrate_resource(key, "v1beta1")
        .await
        .unwrap_err();
    match err {
        MigrationError::ItemFailed { detail, .. } => assert!(detail.contains("no migration path")),
        other => panic!("expected ItemFailed, got {other}"),
    }
}

#[tokio::test]
async fn missing_resource_fails_its_item() {
    let store = MemoryStore::new();
    let mut keys = seed_store(&store, 2);
    keys.push(svm_core::ResourceKey::new("test", "ghost"));

    let orchestrator = orchestrator(Arc::clone(&store), fast_config());
    let task = orchestrator.migrate_batch(keys, "v1beta1");
    let done = wait_terminal(&orchestrator, task.id).await;

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.progress.migrated, 2);
    assert_eq!(done.progress.failed, 1);
    let ghost = done.items.iter().find(|i| i.resource.name == "ghost").unwrap();
    assert!(ghost.error.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn transient_fetch_faults_are_retried() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 1);
    store.fail_next_gets(&keys[0], 1);

    let orchestrator = orchestrator(Arc::clone(&store), fast_config().with_retry_attempts(3));
    let task = orchestrator
        .migrate_resource(keys[0].clone(), "v1beta1")
        .await
        .unwrap();

    assert_eq!(task.items[0].status, ItemStatus::Succeeded);
    assert_eq!(store.stored(&keys[0]).unwrap().api_version, "v1beta1");
}

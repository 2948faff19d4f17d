//! Cancellation safety and task state transitions

use std::sync::Arc;
use std::time::Duration;
use svm_core::{
    ItemStatus, MigrationConfig, MigrationError, MigrationOrchestrator, TaskId, TaskStatus,
};
use svm_test_utils::{platform_graph, seed_store, wait_terminal, MemoryStore};

fn orchestrator(store: Arc<MemoryStore>, config: MigrationConfig) -> MigrationOrchestrator {
    MigrationOrchestrator::new(platform_graph(), store, config).unwrap()
}

/// Spawned tasks start as `Pending`; wait until the runner picks one up
async fn wait_in_progress(orchestrator: &MigrationOrchestrator, id: TaskId) {
    loop {
        let task = orchestrator.get_migration_status(id).unwrap();
        if task.status != TaskStatus::Pending {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn cancellation_leaves_no_item_mid_flight() {
    svm_test_utils::init_tracing();
    let store = MemoryStore::new();
    let keys = seed_store(&store, 30);
    // Pace item admission so the cancel lands mid-run
    store.set_latency(Duration::from_millis(20));

    let orchestrator = orchestrator(
        Arc::clone(&store),
        MigrationConfig::new()
            .with_max_concurrency(1)
            .with_batch_size(1)
            .with_backup(false),
    );
    let task = orchestrator.migrate_batch(keys.clone(), "v1");

    // Wait for at least one item to finish, then cancel
    loop {
        let snapshot = orchestrator.get_migration_status(task.id).unwrap();
        if snapshot.progress.processed() >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    orchestrator.cancel_migration(task.id).unwrap();
    let done = wait_terminal(&orchestrator, task.id).await;

    assert_eq!(done.status, TaskStatus::Cancelled);
    assert!(done.progress.is_drained());
    assert!(done.items.iter().all(|i| i.status.is_terminal()));
    assert!(done.progress.migrated >= 1);
    assert!(done.progress.skipped >= 1);

    // Every resource is either untouched or fully migrated
    for key in &keys {
        let version = store.stored(key).unwrap().api_version;
        assert!(version == "v1alpha1" || version == "v1", "got {version}");
    }
    // Migrated items were started before the cancel; skipped items never were
    let migrated_in_store = keys
        .iter()
        .filter(|key| store.stored(key).unwrap().api_version == "v1")
        .count();
    assert_eq!(migrated_in_store, done.progress.migrated);
}

#[tokio::test]
async fn cancelled_tasks_leave_the_active_list() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 20);
    store.set_latency(Duration::from_millis(20));

    let orchestrator = orchestrator(
        Arc::clone(&store),
        MigrationConfig::new().with_max_concurrency(1).with_batch_size(1),
    );
    let task = orchestrator.migrate_batch(keys, "v1beta1");
    assert!(orchestrator
        .list_active_migrations()
        .iter()
        .any(|t| t.id == task.id));

    wait_in_progress(&orchestrator, task.id).await;
    orchestrator.cancel_migration(task.id).unwrap();
    // The task drains its in-flight item first, then drops off the list
    let done = wait_terminal(&orchestrator, task.id).await;
    assert_eq!(done.status, TaskStatus::Cancelled);
    assert!(orchestrator
        .list_active_migrations()
        .iter()
        .all(|t| t.id != task.id));
}

#[tokio::test]
async fn cancel_defers_terminal_status_until_items_drain() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 10);
    store.set_latency(Duration::from_millis(20));

    let orchestrator = orchestrator(
        Arc::clone(&store),
        MigrationConfig::new().with_max_concurrency(1).with_batch_size(1),
    );
    let task = orchestrator.migrate_batch(keys, "v1beta1");
    wait_in_progress(&orchestrator, task.id).await;
    orchestrator.cancel_migration(task.id).unwrap();

    // A terminal status is only ever observed with settled counters
    let snapshot = orchestrator.get_migration_status(task.id).unwrap();
    if snapshot.status.is_terminal() {
        assert!(snapshot.progress.is_drained());
        assert!(snapshot.finished_at.is_some());
    } else {
        assert_eq!(snapshot.status, TaskStatus::InProgress);
        assert!(snapshot.finished_at.is_none());
    }

    let done = wait_terminal(&orchestrator, task.id).await;
    assert_eq!(done.status, TaskStatus::Cancelled);
    assert!(done.progress.is_drained());
    assert!(done.finished_at.is_some());
}

#[tokio::test]
async fn completed_tasks_cannot_be_cancelled() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 2);

    let orchestrator = orchestrator(Arc::clone(&store), MigrationConfig::new());
    let task = orchestrator.migrate_batch(keys, "v1beta1");
    wait_terminal(&orchestrator, task.id).await;

    let err = orchestrator.cancel_migration(task.id).unwrap_err();
    assert!(matches!(err, MigrationError::InvalidTransition(_)));
}

#[tokio::test]
async fn double_cancel_is_an_invalid_transition() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 20);
    store.set_latency(Duration::from_millis(20));

    let orchestrator = orchestrator(
        Arc::clone(&store),
        MigrationConfig::new().with_max_concurrency(1).with_batch_size(1),
    );
    let task = orchestrator.migrate_batch(keys, "v1beta1");

    wait_in_progress(&orchestrator, task.id).await;
    orchestrator.cancel_migration(task.id).unwrap();
    let err = orchestrator.cancel_migration(task.id).unwrap_err();
    assert!(matches!(err, MigrationError::InvalidTransition(_)));
    wait_terminal(&orchestrator, task.id).await;
}

#[tokio::test]
async fn unknown_task_ids_are_reported() {
    let store = MemoryStore::new();
    let orchestrator = orchestrator(store, MigrationConfig::new());

    let id = TaskId::new();
    assert!(matches!(
        orchestrator.get_migration_status(id).unwrap_err(),
        MigrationError::TaskNotFound(_)
    ));
    assert!(matches!(
        orchestrator.cancel_migration(id).unwrap_err(),
        MigrationError::TaskNotFound(_)
    ));
}

#[tokio::test]
async fn finished_tasks_remain_queryable() {
    let store = MemoryStore::new();
    let keys = seed_store(&store, 3);

    let orchestrator = orchestrator(Arc::clone(&store), MigrationConfig::new());
    let task = orchestrator.migrate_batch(keys, "v1beta1");
    let done = wait_terminal(&orchestrator, task.id).await;
    assert_eq!(done.status, TaskStatus::Completed);

    // Status queries keep working after the terminal state
    let again = orchestrator.get_migration_status(task.id).unwrap();
    assert_eq!(again.status, TaskStatus::Completed);
    assert!(again.items.iter().all(|i| i.status == ItemStatus::Succeeded));
}

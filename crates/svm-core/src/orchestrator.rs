//! Migration orchestrator
//!
//! Drives batch migrations end to end: resolves paths, fans items out to
//! a bounded worker pool, converts and validates each resource, persists
//! results, and tracks every task through its state machine. Cancellation
//! is cooperative; items already in flight run to a terminal state.

use crate::analyze::{AnalysisReport, ResourceAssessment};
use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::history::{MigrationHistory, MigrationHistoryEntry};
use crate::report::{EventLevel, ReportFormat, StatusReporter};
use crate::store::{ResourceStore, StoreError};
use crate::task::{ItemStatus, MigrationTask, TaskId, TaskStatus};
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use svm_convert::{ConversionEngine, Optimizer, PreservedDataEnvelope, Resource, ResourceKey, Validator};
use svm_graph::{MigrationPath, SchemaVersion, VersionGraph};
use tokio::sync::Semaphore;

/// Live state of one registered task
struct TaskHandle {
    task: Mutex<MigrationTask>,
    cancelled: AtomicBool,
}

impl TaskHandle {
    fn new(task: MigrationTask) -> Arc<Self> {
        Arc::new(Self {
            task: Mutex::new(task),
            cancelled: AtomicBool::new(false),
        })
    }

    fn snapshot(&self) -> MigrationTask {
        self.task.lock().clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn set_item_status(&self, idx: usize, status: ItemStatus) {
        self.task.lock().items[idx].status = status;
    }
}

/// Everything the spawned task runners share with the orchestrator
struct Inner {
    graph: Arc<VersionGraph>,
    store: Arc<dyn ResourceStore>,
    engine: ConversionEngine,
    validator: Validator,
    optimizer: Optimizer,
    config: MigrationConfig,
    tasks: DashMap<TaskId, Arc<TaskHandle>>,
    history: MigrationHistory,
    reporter: StatusReporter,
}

/// Coordinates version migrations over a backing store
#[derive(Clone)]
pub struct MigrationOrchestrator {
    inner: Arc<Inner>,
}

impl MigrationOrchestrator {
    /// Create an orchestrator over a version graph and backing store
    ///
    /// # Errors
    /// `MigrationError::Config` when the configuration is rejected.
    pub fn new(
        graph: Arc<VersionGraph>,
        store: Arc<dyn ResourceStore>,
        config: MigrationConfig,
    ) -> Result<Self, MigrationError> {
        config.validate().map_err(MigrationError::Config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                engine: ConversionEngine::new(Arc::clone(&graph)),
                validator: Validator::new(Arc::clone(&graph)),
                optimizer: Optimizer::new(),
                history: MigrationHistory::new(config.history_capacity),
                reporter: StatusReporter::new(config.max_events),
                graph,
                store,
                config,
                tasks: DashMap::new(),
            }),
        })
    }

    /// Migrate one resource and wait for the outcome
    ///
    /// # Errors
    /// `MigrationError::TaskFailed` when the task could not start and
    /// `MigrationError::ItemFailed` when the conversion itself failed.
    pub async fn migrate_resource(
        &self,
        key: ResourceKey,
        target_version: &str,
    ) -> Result<MigrationTask, MigrationError> {
        let handle = self.register_task(target_version, vec![key.clone()]);
        run_task(Arc::clone(&self.inner), Arc::clone(&handle)).await;

        let task = handle.snapshot();
        if task.status == TaskStatus::Failed {
            return Err(MigrationError::TaskFailed(
                task.error.clone().unwrap_or_else(|| "unknown cause".to_string()),
            ));
        }
        let item = &task.items[0];
        if item.status == ItemStatus::Failed {
            return Err(MigrationError::ItemFailed {
                resource: key,
                detail: item.error.clone().unwrap_or_else(|| "unknown cause".to_string()),
            });
        }
        Ok(task)
    }

    /// Start a batch migration and return its initial snapshot
    ///
    /// The task runs in the background; poll it with
    /// [`get_migration_status`](Self::get_migration_status).
    #[must_use]
    pub fn migrate_batch(&self, keys: Vec<ResourceKey>, target_version: &str) -> MigrationTask {
        let handle = self.register_task(target_version, keys);
        let snapshot = handle.snapshot();
        tokio::spawn(run_task(Arc::clone(&self.inner), handle));
        snapshot
    }

    /// Snapshot of a registered task
    ///
    /// # Errors
    /// `MigrationError::TaskNotFound` for unknown ids.
    pub fn get_migration_status(&self, id: TaskId) -> Result<MigrationTask, MigrationError> {
        self.inner
            .tasks
            .get(&id)
            .map(|handle| handle.snapshot())
            .ok_or_else(|| MigrationError::TaskNotFound(id.to_string()))
    }

    /// Snapshots of all tasks not yet in a terminal state
    #[must_use]
    pub fn list_active_migrations(&self) -> Vec<MigrationTask> {
        self.inner
            .tasks
            .iter()
            .map(|entry| entry.value().snapshot())
            .filter(|task| !task.status.is_terminal())
            .collect()
    }

    /// Request cancellation of an in-progress task
    ///
    /// Items already in flight run to a terminal state; items not yet
    /// started are skipped. The task itself reaches `Cancelled` only once
    /// the in-flight items drain, so a terminal status always comes with
    /// fully settled progress counters.
    ///
    /// # Errors
    /// `MigrationError::TaskNotFound` for unknown ids and
    /// `MigrationError::InvalidTransition` unless the task is in progress
    /// with no cancellation already requested.
    pub fn cancel_migration(&self, id: TaskId) -> Result<(), MigrationError> {
        let handle = self
            .inner
            .tasks
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| MigrationError::TaskNotFound(id.to_string()))?;

        // Hold the task lock across the flag swap so the runner's finalize
        // block cannot interleave between the status check and the request
        let task = handle.task.lock();
        if task.status != TaskStatus::InProgress {
            return Err(MigrationError::InvalidTransition(format!(
                "task {id} is {:?}; only in-progress tasks can be cancelled",
                task.status
            )));
        }
        if handle.cancelled.swap(true, Ordering::AcqRel) {
            return Err(MigrationError::InvalidTransition(format!(
                "task {id} cancellation already requested"
            )));
        }
        drop(task);

        self.inner
            .reporter
            .record(id, EventLevel::Warning, "cancellation requested");
        Ok(())
    }

    /// Read-only assessment of a set of resources against a target
    pub async fn analyze(&self, keys: &[ResourceKey], target_version: &str) -> AnalysisReport {
        let mut report = AnalysisReport::new(target_version);
        for key in keys {
            report.push(self.assess(key, target_version).await);
        }
        tracing::info!(
            target = target_version,
            total = report.total,
            needs_migration = report.needs_migration,
            unresolved = report.unresolved,
            "analysis complete"
        );
        report
    }

    async fn assess(&self, key: &ResourceKey, target_version: &str) -> ResourceAssessment {
        let mut assessment = ResourceAssessment {
            resource: key.clone(),
            current_version: None,
            needs_migration: false,
            complexity: None,
            data_loss_risk: false,
            requires_manual: false,
            invalid: false,
            warnings: Vec::new(),
        };

        let resource = match self.inner.store.get(key).await {
            Ok(resource) => resource,
            Err(err) => {
                assessment.warnings.push(err.to_string());
                return assessment;
            }
        };

        let source = self
            .inner
            .config
            .source_version
            .clone()
            .unwrap_or_else(|| resource.api_version.clone());
        assessment.current_version = Some(source.clone());
        if source == target_version {
            return assessment;
        }

        let path = match self.inner.graph.resolve_path(&source, target_version) {
            Ok(path) => path,
            Err(err) => {
                assessment.warnings.push(err.to_string());
                return assessment;
            }
        };

        assessment.needs_migration = true;
        assessment.complexity = Some(path.complexity);
        assessment.data_loss_risk = path.data_loss_risk;
        assessment.requires_manual = path.requires_manual;
        if path.data_loss_risk {
            assessment
                .warnings
                .push(format!("path {source} -> {target_version} crosses a lossy edge"));
        }
        if path.requires_manual {
            assessment
                .warnings
                .push(format!("path {source} -> {target_version} requires manual intervention"));
        }

        match self.inner.validator.validate(&resource, target_version) {
            Ok(result) => {
                assessment.invalid = !result.valid;
                if let Some(first) = result.errors.first() {
                    assessment
                        .warnings
                        .push(format!("{}: {}", first.field_path, first.detail));
                }
                assessment.warnings.extend(result.warnings);
            }
            Err(err) => assessment.warnings.push(err.to_string()),
        }
        assessment
    }

    /// Render a report for a registered task
    ///
    /// # Errors
    /// `MigrationError::TaskNotFound` for unknown ids.
    pub fn report(&self, id: TaskId, format: ReportFormat) -> Result<String, MigrationError> {
        let task = self.get_migration_status(id)?;
        self.inner.reporter.render(&task, format)
    }

    /// Migration history records
    #[must_use]
    pub fn history(&self) -> &MigrationHistory {
        &self.inner.history
    }

    /// Event collector and report renderer
    #[must_use]
    pub fn reporter(&self) -> &StatusReporter {
        &self.inner.reporter
    }

    /// Registered schema versions, in registration order
    #[must_use]
    pub fn schema_versions(&self) -> Vec<SchemaVersion> {
        self.inner.graph.versions().into_iter().cloned().collect()
    }

    /// Resolve the migration path between two versions
    ///
    /// # Errors
    /// `MigrationError::Graph` when no path exists.
    pub fn schema_path(&self, from: &str, to: &str) -> Result<MigrationPath, MigrationError> {
        Ok(self.inner.graph.resolve_path(from, to)?)
    }

    /// The most recent `limit` migration attempts, newest first
    #[must_use]
    pub fn schema_history(&self, limit: usize) -> Vec<MigrationHistoryEntry> {
        self.inner.history.recent(limit)
    }

    fn register_task(&self, target_version: &str, keys: Vec<ResourceKey>) -> Arc<TaskHandle> {
        let task = MigrationTask::new(target_version, keys);
        let id = task.id;
        let handle = TaskHandle::new(task);
        self.inner.tasks.insert(id, Arc::clone(&handle));
        handle
    }
}

/// Drive one task from `Pending` to a terminal state
async fn run_task(inner: Arc<Inner>, handle: Arc<TaskHandle>) {
    let (id, target, total) = {
        let task = handle.task.lock();
        (task.id, task.target_version.clone(), task.items.len())
    };

    if !inner.graph.contains(&target) {
        fail_task(&inner, &handle, format!("target version {target} is not registered"));
        return;
    }
    let shared_path = match &inner.config.source_version {
        Some(source) => match inner.graph.resolve_path(source, &target) {
            Ok(path) => Some(path),
            Err(err) => {
                fail_task(&inner, &handle, err.to_string());
                return;
            }
        },
        None => None,
    };

    handle.task.lock().status = TaskStatus::InProgress;
    inner.reporter.record(
        id,
        EventLevel::Info,
        format!("migrating {total} resource(s) to {target}"),
    );

    let task_start = Instant::now();
    let semaphore = Arc::new(Semaphore::new(inner.config.max_concurrency));
    let indices: Vec<usize> = (0..total).collect();
    for wave in indices.chunks(inner.config.batch_size) {
        if handle.is_cancelled() {
            break;
        }
        let workers = wave.iter().map(|&idx| {
            let inner = Arc::clone(&inner);
            let handle = Arc::clone(&handle);
            let semaphore = Arc::clone(&semaphore);
            let shared_path = shared_path.clone();
            let target = target.clone();
            tokio::spawn(async move {
                // Semaphore is never closed, acquisition cannot fail
                let _permit = semaphore.acquire_owned().await;
                process_item(&inner, &handle, idx, &target, shared_path, task_start).await;
            })
        });
        for joined in join_all(workers).await {
            if let Err(err) = joined {
                tracing::error!(task = %id, "worker panicked: {err}");
            }
        }
    }

    // Finalize under one lock so a concurrent cancel cannot interleave
    let summary = {
        let mut guard = handle.task.lock();
        let task = &mut *guard;
        for item in &mut task.items {
            if !item.status.is_terminal() {
                item.status = ItemStatus::Skipped;
                item.error = Some("not started: task cancelled".to_string());
                task.progress.skipped += 1;
            }
        }
        task.status = if handle.is_cancelled() {
            TaskStatus::Cancelled
        } else {
            TaskStatus::Completed
        };
        task.finished_at = Some(Utc::now());
        format!(
            "{:?}: {} migrated, {} failed, {} skipped of {}",
            task.status,
            task.progress.migrated,
            task.progress.failed,
            task.progress.skipped,
            task.progress.total
        )
    };
    inner.reporter.record(id, EventLevel::Info, summary);
}

/// Abort a task before any item is processed
fn fail_task(inner: &Inner, handle: &TaskHandle, cause: String) {
    let id = {
        let mut guard = handle.task.lock();
        let task = &mut *guard;
        task.status = TaskStatus::Failed;
        task.error = Some(cause.clone());
        task.finished_at = Some(Utc::now());
        for item in &mut task.items {
            item.status = ItemStatus::Failed;
            item.error = Some(cause.clone());
            task.progress.failed += 1;
        }
        task.id
    };
    inner.reporter.record(id, EventLevel::Error, cause);
}

/// Drive one item from `Pending` to a terminal state
async fn process_item(
    inner: &Inner,
    handle: &TaskHandle,
    idx: usize,
    target: &str,
    shared_path: Option<MigrationPath>,
    task_start: Instant,
) {
    if handle.is_cancelled() {
        return;
    }
    let (id, key) = {
        let task = handle.task.lock();
        (task.id, task.items[idx].resource.clone())
    };
    let item_start = Instant::now();
    let mut attempt: u32 = 1;

    // Fetch, retrying transient store faults
    let resource = loop {
        handle.task.lock().items[idx].attempts = attempt;
        match inner.store.get(&key).await {
            Ok(resource) => break resource,
            Err(err) if err.is_transient() && attempt < inner.config.retry_attempts => {
                inner.reporter.record(
                    id,
                    EventLevel::Warning,
                    format!("fetch of {key} failed ({err}); retrying"),
                );
                attempt += 1;
                tokio::time::sleep(inner.config.retry_delay).await;
            }
            Err(err) => {
                finalize_item(inner, handle, idx, ItemStatus::Failed, Some(err.to_string()), task_start);
                return;
            }
        }
    };

    let source = inner
        .config
        .source_version
        .clone()
        .unwrap_or_else(|| resource.api_version.clone());
    handle.task.lock().items[idx].current_version = source.clone();

    if source == target {
        tracing::debug!(resource = %key, version = %source, "already at target, skipping");
        finalize_item(inner, handle, idx, ItemStatus::Skipped, None, task_start);
        return;
    }

    let path = match shared_path {
        Some(path) => path,
        None => match inner.graph.resolve_path(&source, target) {
            Ok(path) => path,
            Err(err) => {
                let cause = err.to_string();
                record_attempt(inner, &key, &source, target, false, item_start, Some(cause.clone()));
                finalize_item(inner, handle, idx, ItemStatus::Failed, Some(cause), task_start);
                return;
            }
        },
    };

    if path.data_loss_risk && !inner.config.acknowledge_data_loss {
        inner.reporter.record(
            id,
            EventLevel::Warning,
            format!(
                "path {source} -> {target} for {key} crosses a lossy edge; dropped fields will be preserved out-of-band"
            ),
        );
    }
    if inner.config.enable_optimizations {
        for suggestion in inner.optimizer.suggest(&resource) {
            inner.reporter.record(id, EventLevel::Info, suggestion);
        }
    }

    match inner.validator.validate(&resource, target) {
        Ok(result) => {
            if !result.warnings.is_empty() {
                inner.reporter.record(
                    id,
                    EventLevel::Warning,
                    format!("{key}: {} validation warning(s) for {target}", result.warnings.len()),
                );
            }
            if !result.valid {
                if inner.config.force {
                    inner.reporter.record(
                        id,
                        EventLevel::Warning,
                        format!("{key}: forcing past {} validation error(s)", result.errors.len()),
                    );
                } else {
                    let first = &result.errors[0];
                    let cause = format!("validation failed: {}: {}", first.field_path, first.detail);
                    record_attempt(inner, &key, &source, target, false, item_start, Some(cause.clone()));
                    finalize_item(inner, handle, idx, ItemStatus::Failed, Some(cause), task_start);
                    return;
                }
            }
        }
        Err(err) => {
            finalize_item(inner, handle, idx, ItemStatus::Failed, Some(err.to_string()), task_start);
            return;
        }
    }

    handle.set_item_status(idx, ItemStatus::Converting);

    // Convert, validate, and persist, retrying transient write faults.
    // Retries re-enter at Converting so path resolution never repeats.
    loop {
        let mut current = resource.clone();
        let mut envelopes: Vec<PreservedDataEnvelope> = Vec::new();
        for edge in &path.edges {
            let prior = envelopes.iter().rev().find(|env| env.source_version == edge.to);
            match inner.engine.convert_edge(&current, edge, prior) {
                Ok(conversion) => {
                    if let Some(envelope) = conversion.envelope {
                        envelopes.push(envelope);
                    }
                    current = conversion.resource;
                }
                Err(err) => {
                    let cause = err.to_string();
                    record_attempt(inner, &key, &source, target, false, item_start, Some(cause.clone()));
                    finalize_item(inner, handle, idx, ItemStatus::Failed, Some(cause), task_start);
                    return;
                }
            }
        }

        handle.set_item_status(idx, ItemStatus::Validating);
        match inner.validator.validate(&current, target) {
            Ok(result) if !result.valid && !inner.config.force => {
                let first = &result.errors[0];
                let cause = format!(
                    "converted resource failed validation: {}: {}",
                    first.field_path, first.detail
                );
                record_attempt(inner, &key, &source, target, false, item_start, Some(cause.clone()));
                finalize_item(inner, handle, idx, ItemStatus::Failed, Some(cause), task_start);
                return;
            }
            Ok(_) => {}
            Err(err) => {
                finalize_item(inner, handle, idx, ItemStatus::Failed, Some(err.to_string()), task_start);
                return;
            }
        }

        let envelope = envelopes.into_iter().last();
        if inner.config.dry_run {
            handle.task.lock().items[idx].envelope = envelope;
            record_attempt(inner, &key, &source, target, true, item_start, None);
            finalize_item(inner, handle, idx, ItemStatus::Succeeded, None, task_start);
            return;
        }

        match persist(inner, &resource, &current).await {
            Ok(()) => {
                inner.optimizer.record_conversion(&current);
                handle.task.lock().items[idx].envelope = envelope;
                record_attempt(inner, &key, &source, target, true, item_start, None);
                finalize_item(inner, handle, idx, ItemStatus::Succeeded, None, task_start);
                return;
            }
            Err(err) if err.is_transient() && attempt < inner.config.retry_attempts => {
                record_attempt(inner, &key, &source, target, false, item_start, Some(err.to_string()));
                inner.reporter.record(
                    id,
                    EventLevel::Warning,
                    format!(
                        "write of {key} failed ({err}); attempt {attempt} of {}, retrying",
                        inner.config.retry_attempts
                    ),
                );
                attempt += 1;
                handle.task.lock().items[idx].attempts = attempt;
                handle.set_item_status(idx, ItemStatus::Converting);
                tokio::time::sleep(inner.config.retry_delay).await;
            }
            Err(err) => {
                let cause = err.to_string();
                record_attempt(inner, &key, &source, target, false, item_start, Some(cause.clone()));
                finalize_item(inner, handle, idx, ItemStatus::Failed, Some(cause), task_start);
                return;
            }
        }
    }
}

/// Snapshot the original and write the converted resource
async fn persist(inner: &Inner, original: &Resource, converted: &Resource) -> Result<(), StoreError> {
    if inner.config.create_backup {
        inner.store.backup(original).await?;
    }
    inner.store.update(converted).await
}

/// Move an item to a terminal state and fold it into the task counters
fn finalize_item(
    inner: &Inner,
    handle: &TaskHandle,
    idx: usize,
    status: ItemStatus,
    error: Option<String>,
    task_start: Instant,
) {
    let (id, resource) = {
        let mut task = handle.task.lock();
        task.items[idx].status = status;
        task.items[idx].error = error.clone();
        task.progress.record(status, task_start.elapsed());
        (task.id, task.items[idx].resource.clone())
    };
    if status == ItemStatus::Failed {
        inner.reporter.record(
            id,
            EventLevel::Error,
            format!("{resource}: {}", error.as_deref().unwrap_or("unknown cause")),
        );
    }
}

/// Record one conversion attempt into the bounded history
fn record_attempt(
    inner: &Inner,
    key: &ResourceKey,
    from: &str,
    to: &str,
    success: bool,
    started: Instant,
    error: Option<String>,
) {
    inner.history.record(MigrationHistoryEntry {
        resource: key.clone(),
        from_version: from.to_string(),
        to_version: to.to_string(),
        timestamp: Utc::now(),
        success,
        duration: started.elapsed(),
        error,
    });
}

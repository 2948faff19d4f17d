//! Testing utilities for the SVM workspace
//!
//! Shared fixtures: an in-memory resource store with scripted fault
//! injection, and a canonical three-version graph.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use svm_convert::{Resource, ResourceKey};
use svm_core::{MigrationOrchestrator, MigrationTask, ResourceStore, StoreError, TaskId};
use svm_graph::{SchemaVersion, Transformation, VersionEdge, VersionGraph};

/// Install a test subscriber that honors `RUST_LOG`
///
/// Safe to call from every test; repeat installs are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory store with scripted transient failures
#[derive(Debug, Default)]
pub struct MemoryStore {
    resources: Mutex<HashMap<ResourceKey, Resource>>,
    backups: Mutex<Vec<Resource>>,
    /// Remaining transient update failures per key
    update_faults: Mutex<HashMap<ResourceKey, u32>>,
    /// Remaining transient get failures per key
    get_faults: Mutex<HashMap<ResourceKey, u32>>,
    /// Artificial delay applied to every get, for pacing tests
    latency: Mutex<std::time::Duration>,
    update_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, resource: Resource) {
        self.resources
            .lock()
            .insert(resource.key.clone(), resource);
    }

    /// Make the next `count` updates of `key` fail transiently
    pub fn fail_next_updates(&self, key: &ResourceKey, count: u32) {
        self.update_faults.lock().insert(key.clone(), count);
    }

    /// Make the next `count` gets of `key` fail transiently
    pub fn fail_next_gets(&self, key: &ResourceKey, count: u32) {
        self.get_faults.lock().insert(key.clone(), count);
    }

    /// Delay every subsequent get by `latency`
    pub fn set_latency(&self, latency: std::time::Duration) {
        *self.latency.lock() = latency;
    }

    pub fn stored(&self, key: &ResourceKey) -> Option<Resource> {
        self.resources.lock().get(key).cloned()
    }

    pub fn backups(&self) -> Vec<Resource> {
        self.backups.lock().clone()
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::Relaxed)
    }

    fn take_fault(faults: &Mutex<HashMap<ResourceKey, u32>>, key: &ResourceKey) -> bool {
        let mut faults = faults.lock();
        match faults.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, key: &ResourceKey) -> Result<Resource, StoreError> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if Self::take_fault(&self.get_faults, key) {
            return Err(StoreError::Transient(format!("injected get fault for {key}")));
        }
        self.resources
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn update(&self, resource: &Resource) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::Relaxed);
        if Self::take_fault(&self.update_faults, &resource.key) {
            return Err(StoreError::Transient(format!(
                "injected update fault for {}",
                resource.key
            )));
        }
        self.resources
            .lock()
            .insert(resource.key.clone(), resource.clone());
        Ok(())
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<ResourceKey>, StoreError> {
        let mut keys: Vec<ResourceKey> = self
            .resources
            .lock()
            .keys()
            .filter(|key| namespace.map_or(true, |ns| key.namespace == ns))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn backup(&self, resource: &Resource) -> Result<(), StoreError> {
        self.backups.lock().push(resource.clone());
        Ok(())
    }
}

/// Canonical three-version graph: v1alpha1 -> v1beta1 -> v1
///
/// The first edge renames `monitoring` to `observability` and is lossy
/// (v1beta1 declares a closed schema, so stray alpha-era fields drop).
/// The second edge is a clean addition of `multiCluster`.
pub fn platform_graph() -> Arc<VersionGraph> {
    let mut graph = VersionGraph::new();
    graph
        .register_version(SchemaVersion::new(
            "v1alpha1",
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        ))
        .unwrap();
    graph
        .register_version(
            SchemaVersion::new("v1beta1", Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap())
                .with_feature("structured observability configuration")
                .with_breaking_change("monitoring renamed to observability")
                .with_required_field("components")
                .with_known_field("observability"),
        )
        .unwrap();
    graph
        .register_version(
            SchemaVersion::new("v1", Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
                .with_feature("multi-cluster support")
                .with_required_field("components")
                .with_known_field("observability")
                .with_known_field("multiCluster"),
        )
        .unwrap();
    graph
        .register_edge(
            VersionEdge::new("v1alpha1", "v1beta1")
                .lossy()
                .with_transformation(Transformation::rename(
                    "monitoring",
                    "observability",
                    "monitoring renamed to observability",
                )),
        )
        .unwrap();
    graph
        .register_edge(VersionEdge::new("v1beta1", "v1").with_transformation(
            Transformation::add("multiCluster", "multi-cluster config, defaults to null"),
        ))
        .unwrap();
    Arc::new(graph)
}

/// A v1alpha1 resource carrying a monitoring block and components
pub fn alpha_resource(name: &str) -> Resource {
    Resource::new("v1alpha1", "Platform", "test", name).with_spec(json!({
        "components": {"prometheus": {"enabled": true, "replicas": 2}},
        "monitoring": {"retention": "30d"}
    }))
}

/// A v1alpha1 resource with a field no later schema represents
pub fn alpha_resource_with_legacy(name: &str) -> Resource {
    Resource::new("v1alpha1", "Platform", "test", name).with_spec(json!({
        "components": {"grafana": {"enabled": true}},
        "monitoring": {"retention": "7d"},
        "legacyFoo": {"mode": "compat"}
    }))
}

/// Poll a task until it reaches a terminal state
///
/// # Panics
/// Panics if the task is unknown or does not finish within five seconds.
pub async fn wait_terminal(orchestrator: &MigrationOrchestrator, id: TaskId) -> MigrationTask {
    for _ in 0..500 {
        let task = orchestrator
            .get_migration_status(id)
            .expect("task registered");
        if task.status.is_terminal() {
            return task;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("task {id} did not reach a terminal state");
}

/// Seed a store with `count` alpha resources named `res-0..`
pub fn seed_store(store: &MemoryStore, count: usize) -> Vec<ResourceKey> {
    (0..count)
        .map(|i| {
            let resource = alpha_resource(&format!("res-{i}"));
            let key = resource.key.clone();
            store.insert(resource);
            key
        })
        .collect()
}

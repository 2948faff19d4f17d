//! SVM Core - Migration orchestration
//!
//! Coordinates schema-version migrations end to end:
//! - `MigrationOrchestrator` runs single-resource and batch migrations
//!   over a bounded worker pool with cooperative cancellation
//! - `MigrationTask` / `MigrationItem` track forward-only state machines
//! - `MigrationHistory` retains a bounded record with rolling analytics
//! - `StatusReporter` collects events and renders reports
//! - `analyze` assesses a resource set before anything is written
//!
//! # Example
//!
//! ```rust,ignore
//! use svm_core::{MigrationConfig, MigrationOrchestrator};
//!
//! let orchestrator = MigrationOrchestrator::new(graph, store, MigrationConfig::new())?;
//! let task = orchestrator.migrate_batch(keys, "v1beta1");
//! let status = orchestrator.get_migration_status(task.id)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod analyze;
pub mod config;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod report;
pub mod store;
pub mod task;

pub use analyze::{AnalysisReport, ResourceAssessment};
pub use config::MigrationConfig;
pub use error::MigrationError;
pub use history::{MigrationAnalytics, MigrationHistory, MigrationHistoryEntry};
pub use orchestrator::MigrationOrchestrator;
pub use report::{EventLevel, MigrationEvent, MigrationReport, ReportFormat, StatusReporter};
pub use store::{ResourceStore, StoreError};
pub use task::{ItemStatus, MigrationItem, MigrationTask, Progress, TaskId, TaskStatus};

// Re-exported so orchestrator callers need not depend on the lower crates
pub use svm_convert::{
    annotations, PreservedDataEnvelope, Resource, ResourceKey, ValidationResult, Validator,
};
pub use svm_graph::{MigrationPath, SchemaVersion, VersionEdge, VersionGraph};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

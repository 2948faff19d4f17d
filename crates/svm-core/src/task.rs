//! Migration task and item state machines
//!
//! A task tracks one batch migration toward a single target version. Each
//! item inside it tracks one resource. Both state machines move forward
//! only; a retried item re-enters `Converting`, never `Pending`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use svm_convert::{PreservedDataEnvelope, ResourceKey};
use ulid::Ulid;

/// Unique migration task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub Ulid);

impl TaskId {
    /// Generate a fresh task id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

/// Per-resource migration states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Not yet admitted to a worker
    Pending,
    /// Conversion in flight (also re-entered on retry)
    Converting,
    /// Post-conversion validation in flight
    Validating,
    /// Converted, validated, and persisted
    Succeeded,
    /// Terminal failure after exhausting applicable retries
    Failed,
    /// Excluded without conversion (already at target, or never started)
    Skipped,
}

impl ItemStatus {
    /// Whether this state is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

/// Whole-task states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Created, path resolution not yet done
    Pending,
    /// Items are being processed
    InProgress,
    /// All items reached a terminal state; individual items may have failed
    Completed,
    /// The task itself could not proceed; no item was converted
    Failed,
    /// Cancelled while in progress; in-flight items ran to completion
    Cancelled,
}

impl TaskStatus {
    /// Whether this state is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One resource tracked inside a migration task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationItem {
    /// Resource identity
    pub resource: ResourceKey,
    /// Version detected when the item was admitted
    pub current_version: String,
    /// Requested target version
    pub target_version: String,
    /// Item state
    pub status: ItemStatus,
    /// Cause of the terminal failure, if any
    pub error: Option<String>,
    /// Attempts consumed, including the first
    pub attempts: u32,
    /// Out-of-band data captured during conversion, if any
    pub envelope: Option<PreservedDataEnvelope>,
}

impl MigrationItem {
    /// Create a pending item
    #[must_use]
    pub fn new(resource: ResourceKey, target_version: impl Into<String>) -> Self {
        Self {
            resource,
            current_version: String::new(),
            target_version: target_version.into(),
            status: ItemStatus::Pending,
            error: None,
            attempts: 0,
            envelope: None,
        }
    }
}

/// Monotonic progress counters for a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Items in the task
    pub total: usize,
    /// Items that reached `Succeeded`
    pub migrated: usize,
    /// Items that reached `Failed`
    pub failed: usize,
    /// Items that reached `Skipped`
    pub skipped: usize,
    /// Mean wall time per processed item
    pub average_item_time: Option<Duration>,
    /// Projected time to drain the remaining items
    pub estimated_remaining: Option<Duration>,
}

impl Progress {
    /// Items in a terminal state
    #[inline]
    #[must_use]
    pub fn processed(&self) -> usize {
        self.migrated + self.failed + self.skipped
    }

    /// Whether every item reached a terminal state
    #[inline]
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.processed() == self.total
    }

    /// Fold one terminal item into the counters and refresh the estimate
    pub(crate) fn record(&mut self, status: ItemStatus, elapsed_since_start: Duration) {
        match status {
            ItemStatus::Succeeded => self.migrated += 1,
            ItemStatus::Failed => self.failed += 1,
            ItemStatus::Skipped => self.skipped += 1,
            _ => return,
        }
        let processed = self.processed();
        debug_assert!(processed <= self.total);
        if processed > 0 {
            let average = elapsed_since_start / processed as u32;
            self.average_item_time = Some(average);
            let remaining = (self.total - processed) as u32;
            self.estimated_remaining = Some(average * remaining);
        }
    }
}

/// One batch migration toward a target version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationTask {
    /// Unique task id
    pub id: TaskId,
    /// Requested target version
    pub target_version: String,
    /// Task state
    pub status: TaskStatus,
    /// Creation time
    pub started_at: DateTime<Utc>,
    /// Time the task reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
    /// Aggregated progress counters
    pub progress: Progress,
    /// Per-resource items, in admission order
    pub items: Vec<MigrationItem>,
    /// Task-level failure cause
    pub error: Option<String>,
}

impl MigrationTask {
    /// Create a pending task over the given resources
    #[must_use]
    pub fn new(target_version: impl Into<String>, resources: Vec<ResourceKey>) -> Self {
        let target_version = target_version.into();
        let items: Vec<MigrationItem> = resources
            .into_iter()
            .map(|key| MigrationItem::new(key, target_version.clone()))
            .collect();
        let progress = Progress {
            total: items.len(),
            ..Progress::default()
        };
        Self {
            id: TaskId::new(),
            target_version,
            status: TaskStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            progress,
            items,
            error: None,
        }
    }

    /// Wall time since the task started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }
}

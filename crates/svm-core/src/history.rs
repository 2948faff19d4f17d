//! Bounded migration history
//!
//! A fixed-capacity ring buffer of per-attempt records plus rolling
//! analytics. When the buffer is full, recording a new entry evicts the
//! oldest; the analytics counters keep counting across evictions.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use svm_convert::ResourceKey;

/// One recorded migration attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationHistoryEntry {
    /// Resource the attempt targeted
    pub resource: ResourceKey,
    /// Version the attempt started from
    pub from_version: String,
    /// Version the attempt targeted
    pub to_version: String,
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Wall time the attempt took
    pub duration: Duration,
    /// Failure cause, when `success` is false
    pub error: Option<String>,
}

/// Rolling counters across all recorded attempts, evicted or not
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationAnalytics {
    /// Attempts recorded
    pub total: u64,
    /// Successful attempts
    pub succeeded: u64,
    /// Failed attempts, including retried transient failures
    pub failed: u64,
    /// Attempts per "from -> to" path
    pub by_path: BTreeMap<String, u64>,
    /// Mean attempt duration
    pub average_duration: Duration,
}

impl MigrationAnalytics {
    /// Success ratio over all recorded attempts
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }

    fn absorb(&mut self, entry: &MigrationHistoryEntry) {
        let previous_total = self.total;
        self.total += 1;
        if entry.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        *self
            .by_path
            .entry(format!("{} -> {}", entry.from_version, entry.to_version))
            .or_insert(0) += 1;

        // Incremental mean, immune to buffer eviction
        let sum = self.average_duration * previous_total as u32 + entry.duration;
        self.average_duration = sum / self.total as u32;
    }
}

#[derive(Debug)]
struct Inner {
    entries: VecDeque<MigrationHistoryEntry>,
    analytics: MigrationAnalytics,
}

/// Fixed-capacity migration history
#[derive(Debug)]
pub struct MigrationHistory {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl MigrationHistory {
    /// Create a history retaining at most `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.max(1)),
                analytics: MigrationAnalytics::default(),
            }),
        }
    }

    /// Record an attempt, evicting the oldest entry when full
    pub fn record(&self, entry: MigrationHistoryEntry) {
        let mut inner = self.inner.lock();
        inner.analytics.absorb(&entry);
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
    }

    /// Retained entries, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<MigrationHistoryEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    /// The most recent `limit` entries, newest first
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<MigrationHistoryEntry> {
        self.inner
            .lock()
            .entries
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Retained entries touching one resource, oldest first
    #[must_use]
    pub fn for_resource(&self, key: &ResourceKey) -> Vec<MigrationHistoryEntry> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| &entry.resource == key)
            .cloned()
            .collect()
    }

    /// Number of retained entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no entries are retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Snapshot of the rolling analytics
    #[must_use]
    pub fn analytics(&self) -> MigrationAnalytics {
        self.inner.lock().analytics.clone()
    }
}

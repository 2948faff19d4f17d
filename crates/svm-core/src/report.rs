//! Migration status reporting
//!
//! Collects task-scoped events in a bounded buffer and renders task
//! snapshots into JSON, plain text, or Markdown reports with actionable
//! recommendations.

use crate::error::MigrationError;
use crate::task::{ItemStatus, MigrationTask, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    /// Routine progress
    Info,
    /// Something to review, processing continued
    Warning,
    /// A failure was recorded
    Error,
}

/// One reportable event during a migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationEvent {
    /// Task the event belongs to
    pub task_id: TaskId,
    /// Severity
    pub level: EventLevel,
    /// Human-readable message
    pub message: String,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
}

/// Output formats for rendered reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Pretty-printed JSON
    Json,
    /// Plain text summary
    Text,
    /// Markdown with a per-item table
    Markdown,
}

/// Structured report built from a task snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Task id
    pub task_id: TaskId,
    /// Task state at snapshot time
    pub status: TaskStatus,
    /// Requested target version
    pub target_version: String,
    /// Creation time
    pub started_at: DateTime<Utc>,
    /// Terminal time, if reached
    pub finished_at: Option<DateTime<Utc>>,
    /// Items in the task
    pub total: usize,
    /// Items migrated
    pub migrated: usize,
    /// Items failed
    pub failed: usize,
    /// Items skipped
    pub skipped: usize,
    /// Failure summaries, one per failed item
    pub failures: Vec<String>,
    /// Events recorded for this task, oldest first
    pub events: Vec<MigrationEvent>,
    /// Follow-up suggestions derived from the outcome
    pub recommendations: Vec<String>,
}

/// Collects events and renders task reports
#[derive(Debug)]
pub struct StatusReporter {
    max_events: usize,
    events: Mutex<VecDeque<MigrationEvent>>,
}

impl StatusReporter {
    /// Create a reporter retaining at most `max_events` events
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            max_events: max_events.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Record an event, evicting the oldest when full
    pub fn record(&self, task_id: TaskId, level: EventLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            EventLevel::Info => tracing::info!(task = %task_id, "{message}"),
            EventLevel::Warning => tracing::warn!(task = %task_id, "{message}"),
            EventLevel::Error => tracing::error!(task = %task_id, "{message}"),
        }
        let mut events = self.events.lock();
        if events.len() == self.max_events {
            events.pop_front();
        }
        events.push_back(MigrationEvent {
            task_id,
            level,
            message,
            timestamp: Utc::now(),
        });
    }

    /// Retained events for one task, oldest first
    #[must_use]
    pub fn events_for(&self, task_id: TaskId) -> Vec<MigrationEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Build a structured report from a task snapshot
    #[must_use]
    pub fn build_report(&self, task: &MigrationTask) -> MigrationReport {
        let failures: Vec<String> = task
            .items
            .iter()
            .filter(|item| item.status == ItemStatus::Failed)
            .map(|item| {
                format!(
                    "{}: {}",
                    item.resource,
                    item.error.as_deref().unwrap_or("unknown cause")
                )
            })
            .collect();

        MigrationReport {
            task_id: task.id,
            status: task.status,
            target_version: task.target_version.clone(),
            started_at: task.started_at,
            finished_at: task.finished_at,
            total: task.progress.total,
            migrated: task.progress.migrated,
            failed: task.progress.failed,
            skipped: task.progress.skipped,
            failures,
            events: self.events_for(task.id),
            recommendations: recommendations(task),
        }
    }

    /// Render a task snapshot in the requested format
    ///
    /// # Errors
    /// `MigrationError::Convert` if JSON serialization fails.
    pub fn render(&self, task: &MigrationTask, format: ReportFormat) -> Result<String, MigrationError> {
        let report = self.build_report(task);
        match format {
            ReportFormat::Json => serde_json::to_string_pretty(&report)
                .map_err(|err| MigrationError::Convert(err.into())),
            ReportFormat::Text => Ok(render_text(&report)),
            ReportFormat::Markdown => Ok(render_markdown(&report, task)),
        }
    }
}

/// Derive follow-up suggestions from the task outcome
fn recommendations(task: &MigrationTask) -> Vec<String> {
    let mut out = Vec::new();
    if task.progress.failed > 0 {
        out.push(format!(
            "{} item(s) failed; inspect the failure causes and re-run the batch for those resources",
            task.progress.failed
        ));
    }
    if task.progress.skipped > 0 && task.status == TaskStatus::Completed {
        out.push(format!(
            "{} item(s) were skipped, most commonly because they already carried the target version",
            task.progress.skipped
        ));
    }
    if task.status == TaskStatus::Cancelled {
        out.push("the task was cancelled; unprocessed resources remain at their prior versions".to_string());
    }
    if task
        .items
        .iter()
        .any(|item| item.envelope.as_ref().is_some_and(|env| !env.is_empty()))
    {
        out.push(
            "out-of-band data was preserved for some resources; keep the envelopes until a reverse migration is ruled out"
                .to_string(),
        );
    }
    if out.is_empty() {
        out.push("no follow-up required".to_string());
    }
    out
}

fn render_text(report: &MigrationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "migration task {}", report.task_id);
    let _ = writeln!(out, "  status: {:?}", report.status);
    let _ = writeln!(out, "  target: {}", report.target_version);
    let _ = writeln!(
        out,
        "  progress: {}/{} migrated, {} failed, {} skipped",
        report.migrated, report.total, report.failed, report.skipped
    );
    for failure in &report.failures {
        let _ = writeln!(out, "  failure: {failure}");
    }
    for recommendation in &report.recommendations {
        let _ = writeln!(out, "  next: {recommendation}");
    }
    out
}

fn render_markdown(report: &MigrationReport, task: &MigrationTask) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Migration report: {}", report.task_id);
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Status**: {:?}", report.status);
    let _ = writeln!(out, "- **Target version**: {}", report.target_version);
    let _ = writeln!(
        out,
        "- **Progress**: {}/{} migrated, {} failed, {} skipped",
        report.migrated, report.total, report.failed, report.skipped
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "| Resource | From | Status | Error |");
    let _ = writeln!(out, "|----------|------|--------|-------|");
    for item in &task.items {
        let _ = writeln!(
            out,
            "| {} | {} | {:?} | {} |",
            item.resource,
            item.current_version,
            item.status,
            item.error.as_deref().unwrap_or("-")
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Recommendations");
    for recommendation in &report.recommendations {
        let _ = writeln!(out, "- {recommendation}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::MigrationTask;
    use svm_convert::ResourceKey;

    fn finished_task() -> MigrationTask {
        let mut task = MigrationTask::new(
            "v1beta1",
            vec![ResourceKey::new("ns", "a"), ResourceKey::new("ns", "b")],
        );
        task.status = TaskStatus::Completed;
        task.finished_at = Some(Utc::now());
        task.items[0].status = ItemStatus::Succeeded;
        task.items[0].current_version = "v1alpha1".to_string();
        task.items[1].status = ItemStatus::Failed;
        task.items[1].error = Some("store failure: quota exceeded".to_string());
        task.progress.migrated = 1;
        task.progress.failed = 1;
        task
    }

    #[test]
    fn event_buffer_is_bounded() {
        let reporter = StatusReporter::new(2);
        let id = TaskId::new();
        for i in 0..4 {
            reporter.record(id, EventLevel::Info, format!("event {i}"));
        }
        let events = reporter.events_for(id);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "event 2");
        assert_eq!(events[1].message, "event 3");
    }

    #[test]
    fn events_are_scoped_by_task() {
        let reporter = StatusReporter::new(8);
        let mine = TaskId::new();
        let other = TaskId::new();
        reporter.record(mine, EventLevel::Info, "mine");
        reporter.record(other, EventLevel::Info, "theirs");
        assert_eq!(reporter.events_for(mine).len(), 1);
    }

    #[test]
    fn report_captures_failures_and_recommendations() {
        let reporter = StatusReporter::new(8);
        let task = finished_task();
        let report = reporter.build_report(&task);

        assert_eq!(report.total, 2);
        assert_eq!(report.migrated, 1);
        assert_eq!(report.failed, 1);
        assert!(report.failures[0].contains("quota exceeded"));
        assert!(report.recommendations[0].contains("failed"));
    }

    #[test]
    fn json_rendering_is_parseable() {
        let reporter = StatusReporter::new(8);
        let rendered = reporter
            .render(&finished_task(), ReportFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["total"], 2);
    }

    #[test]
    fn markdown_rendering_includes_item_table() {
        let reporter = StatusReporter::new(8);
        let rendered = reporter
            .render(&finished_task(), ReportFormat::Markdown)
            .unwrap();
        assert!(rendered.contains("| ns/a |"));
        assert!(rendered.contains("| ns/b |"));
        assert!(rendered.contains("## Recommendations"));
    }

    #[test]
    fn clean_completion_recommends_nothing() {
        let reporter = StatusReporter::new(8);
        let mut task = MigrationTask::new("v1beta1", vec![ResourceKey::new("ns", "a")]);
        task.status = TaskStatus::Completed;
        task.items[0].status = ItemStatus::Succeeded;
        task.progress.migrated = 1;

        let report = reporter.build_report(&task);
        assert_eq!(report.recommendations, vec!["no follow-up required"]);
    }
}

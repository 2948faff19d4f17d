//! Migration orchestrator configuration

use std::time::Duration;

/// Tunable knobs for a migration run
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Maximum items converted concurrently within a task
    pub max_concurrency: usize,
    /// Items admitted per processing wave
    pub batch_size: usize,
    /// Total attempts per item for transient store failures
    pub retry_attempts: u32,
    /// Delay between retry attempts
    pub retry_delay: Duration,
    /// Consult the optimizer and log its suggestions
    pub enable_optimizations: bool,
    /// Resolve, convert, and validate without writing back
    pub dry_run: bool,
    /// Proceed past validation warnings and soft errors
    pub force: bool,
    /// Suppress the per-item warning for lossy paths
    pub acknowledge_data_loss: bool,
    /// Snapshot each resource before writing the converted form
    pub create_backup: bool,
    /// Treat every item as starting from this version instead of the
    /// version stored on the resource
    pub source_version: Option<String>,
    /// Ring-buffer capacity for migration history
    pub history_capacity: usize,
    /// Ring-buffer capacity for reporter events
    pub max_events: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            batch_size: 50,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
            enable_optimizations: true,
            dry_run: false,
            force: false,
            acknowledge_data_loss: false,
            create_backup: true,
            source_version: None,
            history_capacity: 256,
            max_events: 512,
        }
    }
}

impl MigrationConfig {
    /// Create a configuration with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum concurrent item conversions
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the processing wave size
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the total attempts for transient store failures
    #[must_use]
    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    /// Set the delay between retry attempts
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Enable or disable optimizer suggestions
    #[must_use]
    pub fn with_optimizations(mut self, enable: bool) -> Self {
        self.enable_optimizations = enable;
        self
    }

    /// Enable dry-run mode
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Proceed past validation warnings
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Acknowledge data loss on lossy paths up front
    #[must_use]
    pub fn with_acknowledged_data_loss(mut self, acknowledge: bool) -> Self {
        self.acknowledge_data_loss = acknowledge;
        self
    }

    /// Enable or disable pre-write backups
    #[must_use]
    pub fn with_backup(mut self, create_backup: bool) -> Self {
        self.create_backup = create_backup;
        self
    }

    /// Override the detected source version for every item
    #[must_use]
    pub fn with_source_version(mut self, source_version: impl Into<String>) -> Self {
        self.source_version = Some(source_version.into());
        self
    }

    /// Set the history ring-buffer capacity
    #[must_use]
    pub fn with_history_capacity(mut self, history_capacity: usize) -> Self {
        self.history_capacity = history_capacity;
        self
    }

    /// Validate the configuration before a run
    ///
    /// # Errors
    /// `String` naming the first rejected knob.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        if self.retry_attempts == 0 {
            return Err("retry_attempts must be at least 1".to_string());
        }
        if self.history_capacity == 0 {
            return Err("history_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

//! Error types for migration orchestration

use crate::store::StoreError;
use svm_convert::{ConvertError, ResourceKey};
use svm_graph::GraphError;
use thiserror::Error;

/// Errors surfaced by the migration orchestrator
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Version graph lookup or path resolution failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Single-edge conversion failed
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// Backing store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Resource failed validation against the target schema
    #[error("validation failed for {resource}: {detail}")]
    ValidationFailed {
        /// Resource that failed validation
        resource: ResourceKey,
        /// First hard error or warning summary
        detail: String,
    },

    /// A migration item reached a terminal failure
    #[error("migration of {resource} failed: {detail}")]
    ItemFailed {
        /// Resource whose migration failed
        resource: ResourceKey,
        /// Cause recorded on the item
        detail: String,
    },

    /// A whole task aborted before any item was processed
    #[error("migration task failed: {0}")]
    TaskFailed(String),

    /// Requested state transition is not permitted
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// No migration task registered under the given id
    #[error("migration task not found: {0}")]
    TaskNotFound(String),

    /// Configuration rejected before any work started
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MigrationError {
    /// Whether retrying the same operation may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_store_errors_are_retryable() {
        let err = MigrationError::Store(StoreError::Transient("connection reset".into()));
        assert!(err.is_retryable());
    }

    #[test]
    fn graph_errors_are_not_retryable() {
        let err = MigrationError::Graph(GraphError::VersionNotFound("v9".into()));
        assert!(!err.is_retryable());
    }
}

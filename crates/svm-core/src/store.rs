//! Backing store abstraction
//!
//! The orchestrator reads and writes resources through this trait so the
//! engine stays independent of any particular persistence layer. Errors
//! distinguish transient faults, which the orchestrator retries, from
//! permanent ones, which fail the item immediately.

use async_trait::async_trait;
use svm_convert::{Resource, ResourceKey};
use thiserror::Error;

/// Errors from the backing store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Retryable fault such as a timeout or connection reset
    #[error("transient store failure: {0}")]
    Transient(String),

    /// No resource stored under the given key
    #[error("resource not found: {0}")]
    NotFound(ResourceKey),

    /// Non-retryable store failure
    #[error("store failure: {0}")]
    Permanent(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Persistence operations the orchestrator needs
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a resource by key
    async fn get(&self, key: &ResourceKey) -> Result<Resource, StoreError>;

    /// Persist a converted resource
    async fn update(&self, resource: &Resource) -> Result<(), StoreError>;

    /// List resource keys, optionally scoped to a namespace
    async fn list(&self, namespace: Option<&str>) -> Result<Vec<ResourceKey>, StoreError>;

    /// Snapshot a resource before it is overwritten
    async fn backup(&self, resource: &Resource) -> Result<(), StoreError>;
}

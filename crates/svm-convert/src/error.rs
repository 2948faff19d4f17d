//! Error types for conversion and preservation

use crate::resource::ResourceKey;

/// Conversion and preservation errors
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Envelope applied to a resource it was not captured from
    #[error("preservation envelope for {expected} applied to {actual}")]
    IdentityMismatch {
        /// Identity the envelope was captured from
        expected: ResourceKey,
        /// Identity of the resource being restored
        actual: ResourceKey,
    },

    /// Envelope buckets no longer match their integrity hash
    #[error("preservation envelope integrity hash mismatch for {0}")]
    IntegrityViolation(ResourceKey),

    /// Resource version does not match the edge's source version
    #[error("resource {resource} is at {actual}, edge converts from {expected}")]
    VersionMismatch {
        /// Resource identity
        resource: ResourceKey,
        /// Edge source version
        expected: String,
        /// Resource's declared version
        actual: String,
    },

    /// Edge endpoint not registered in the version graph
    #[error("unknown schema version: {0}")]
    UnknownVersion(String),

    /// Field path could not be written (non-object intermediate)
    #[error("invalid field path: {0}")]
    FieldPath(String),

    /// JSON (de)serialization failure
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

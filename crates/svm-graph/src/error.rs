//! Error types for the version graph

/// Version graph errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Version already registered
    #[error("version already registered: {0}")]
    DuplicateVersion(String),

    /// Version not known to the graph
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// No route between the requested versions
    #[error("no migration path found from {from} to {to}")]
    NoPathFound {
        /// Requested source version
        from: String,
        /// Requested target version
        to: String,
    },
}

impl GraphError {
    /// Check whether this error is a missing-route error
    #[inline]
    #[must_use]
    pub fn is_no_path(&self) -> bool {
        matches!(self, Self::NoPathFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GraphError::NoPathFound {
            from: "v1alpha1".to_string(),
            to: "v2".to_string(),
        };
        assert!(err.to_string().contains("v1alpha1"));
        assert!(err.is_no_path());
    }
}

//! Schema version and edge records
//!
//! Versions and the transformations between them are plain data, not code:
//! new versions and edges are registered on the graph without touching
//! orchestration logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, immutable revision of a managed resource's declared shape
///
/// Published versions are appended to the graph, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Version identifier, e.g. "v1alpha1"
    pub name: String,
    /// Release timestamp
    pub release_date: DateTime<Utc>,
    /// Whether the version is deprecated
    pub deprecated: bool,
    /// Human-readable deprecation message
    pub deprecation_message: Option<String>,
    /// Notable features introduced by this version
    pub features: Vec<String>,
    /// Breaking changes relative to the previous version
    pub breaking_changes: Vec<String>,
    /// Field paths deprecated in this version
    pub deprecated_fields: Vec<String>,
    /// Spec field paths (or prefixes) this version can represent
    ///
    /// An empty list declares an open schema: every field is considered
    /// representable and nothing is treated as unknown.
    pub known_fields: Vec<String>,
    /// Spec field paths that must be present and non-null
    pub required_fields: Vec<String>,
}

impl SchemaVersion {
    /// Create a new version record
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, release_date: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            release_date,
            deprecated: false,
            deprecation_message: None,
            features: Vec::new(),
            breaking_changes: Vec::new(),
            deprecated_fields: Vec::new(),
            known_fields: Vec::new(),
            required_fields: Vec::new(),
        }
    }

    /// Mark the version deprecated with a message
    #[inline]
    #[must_use]
    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = true;
        self.deprecation_message = Some(message.into());
        self
    }

    /// Add a feature description
    #[inline]
    #[must_use]
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    /// Add a breaking-change description
    #[inline]
    #[must_use]
    pub fn with_breaking_change(mut self, change: impl Into<String>) -> Self {
        self.breaking_changes.push(change.into());
        self
    }

    /// Add a deprecated field path
    #[inline]
    #[must_use]
    pub fn with_deprecated_field(mut self, field: impl Into<String>) -> Self {
        self.deprecated_fields.push(field.into());
        self
    }

    /// Add a representable field path (or prefix)
    #[inline]
    #[must_use]
    pub fn with_known_field(mut self, field: impl Into<String>) -> Self {
        self.known_fields.push(field.into());
        self
    }

    /// Add a required field path
    ///
    /// Required fields are implicitly known.
    #[inline]
    #[must_use]
    pub fn with_required_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.known_fields.push(field.clone());
        self.required_fields.push(field);
        self
    }

    /// Whether a dotted field path is representable in this version
    ///
    /// A path is representable when the schema is open (no known fields
    /// declared) or when it sits on, under, or above a declared field.
    #[must_use]
    pub fn represents(&self, path: &str) -> bool {
        if self.known_fields.is_empty() {
            return true;
        }
        self.known_fields.iter().any(|known| {
            path == known
                || path.starts_with(&format!("{known}."))
                || known.starts_with(&format!("{path}."))
        })
    }
}

/// Kinds of per-field transformation an edge can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformationKind {
    /// Field moves to a new path, value unchanged
    Rename,
    /// Field representation changes structurally (e.g. scalar to list)
    Restructure,
    /// Field does not exist in the target version
    Remove,
    /// Field is new in the target version, filled with a default
    Add,
}

/// One field-level transformation along an edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    /// Source field path in dotted notation, e.g. "spec.monitoring"
    pub field: String,
    /// Transformation kind
    pub kind: TransformationKind,
    /// Target field path for renames/restructures
    pub target_field: Option<String>,
    /// Human-readable description
    pub description: String,
}

impl Transformation {
    /// Create a rename transformation
    #[inline]
    #[must_use]
    pub fn rename(
        field: impl Into<String>,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: TransformationKind::Rename,
            target_field: Some(target.into()),
            description: description.into(),
        }
    }

    /// Create a restructure transformation
    #[inline]
    #[must_use]
    pub fn restructure(
        field: impl Into<String>,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: TransformationKind::Restructure,
            target_field: Some(target.into()),
            description: description.into(),
        }
    }

    /// Create a remove transformation
    #[inline]
    #[must_use]
    pub fn remove(field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: TransformationKind::Remove,
            target_field: None,
            description: description.into(),
        }
    }

    /// Create an add transformation
    #[inline]
    #[must_use]
    pub fn add(field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: TransformationKind::Add,
            target_field: None,
            description: description.into(),
        }
    }
}

/// A registered, directed transformation between two adjacent versions
///
/// The reverse direction, if supported, is a distinct edge with its own
/// loss characteristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEdge {
    /// Source version name
    pub from: String,
    /// Target version name
    pub to: String,
    /// Whether data can be lost along this edge
    pub lossy: bool,
    /// Whether the edge needs manual intervention
    pub requires_manual: bool,
    /// Field transformations applied along this edge
    pub transformations: Vec<Transformation>,
}

impl VersionEdge {
    /// Create a new non-lossy edge
    #[inline]
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            lossy: false,
            requires_manual: false,
            transformations: Vec::new(),
        }
    }

    /// Mark the edge lossy
    #[inline]
    #[must_use]
    pub fn lossy(mut self) -> Self {
        self.lossy = true;
        self
    }

    /// Mark the edge as requiring manual intervention
    #[inline]
    #[must_use]
    pub fn requires_manual(mut self) -> Self {
        self.requires_manual = true;
        self
    }

    /// Add a transformation
    #[inline]
    #[must_use]
    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformations.push(transformation);
        self
    }
}

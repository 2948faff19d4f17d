//! SVM Graph - Schema version compatibility graph
//!
//! Holds the set of known schema versions, their release and deprecation
//! metadata, and the directed edges describing one-step transformations
//! between adjacent versions:
//! - Version and edge registration (append-only, data-driven)
//! - Shortest-path resolution with deterministic tie-breaking
//! - Aggregate loss-risk and complexity classification per path
//!
//! # Example
//!
//! ```rust
//! use svm_graph::{SchemaVersion, VersionEdge, VersionGraph};
//! use chrono::Utc;
//!
//! # fn example() -> Result<(), svm_graph::GraphError> {
//! let mut graph = VersionGraph::new();
//! graph.register_version(SchemaVersion::new("v1alpha1", Utc::now()))?;
//! graph.register_version(SchemaVersion::new("v1beta1", Utc::now()))?;
//! graph.register_edge(VersionEdge::new("v1alpha1", "v1beta1"))?;
//!
//! let path = graph.resolve_path("v1alpha1", "v1beta1")?;
//! assert!(path.direct);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod graph;
pub mod version;

pub use error::GraphError;
pub use graph::{Complexity, MigrationPath, VersionGraph};
pub use version::{SchemaVersion, Transformation, TransformationKind, VersionEdge};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

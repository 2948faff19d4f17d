//! Version graph and migration path resolution
//!
//! Holds the registered schema versions and the directed edges between
//! them, and resolves migration paths:
//! - Shortest path first (fewest hops)
//! - Non-lossy paths preferred among equal lengths
//! - Remaining ties broken by edge registration order

use crate::error::GraphError;
use crate::version::{SchemaVersion, Transformation, VersionEdge};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate complexity classification of a migration path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Complexity {
    /// Single non-lossy hop
    Low,
    /// Single lossy hop, or two non-lossy hops
    Medium,
    /// Two or more hops with a lossy edge, or three or more hops
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Low => write!(f, "Low"),
            Complexity::Medium => write!(f, "Medium"),
            Complexity::High => write!(f, "High"),
        }
    }
}

/// Resolved route between two schema versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPath {
    /// Source version
    pub from: String,
    /// Target version
    pub to: String,
    /// Single edge (or no-op) rather than multi-hop
    pub direct: bool,
    /// Intermediate version names, excluding the endpoints
    pub hops: Vec<String>,
    /// Ordered edges making up the path
    pub edges: Vec<VersionEdge>,
    /// True if any edge on the path is lossy
    pub data_loss_risk: bool,
    /// True if any edge on the path requires manual intervention
    pub requires_manual: bool,
    /// Aggregate complexity classification
    pub complexity: Complexity,
    /// Union of transformations along the path, in edge order
    pub transformations: Vec<Transformation>,
}

impl MigrationPath {
    /// Number of edges on the path
    #[inline]
    #[must_use]
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }

    /// True for the degenerate `from == to` path
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Registry of schema versions and the directed edges between them
///
/// Read-mostly, process-wide state: registration is an administrative
/// operation assumed to happen before migrations start, after which the
/// graph is safe for unsynchronized concurrent reads.
#[derive(Debug, Default)]
pub struct VersionGraph {
    /// Versions in registration order
    versions: IndexMap<String, SchemaVersion>,
    /// Edges in registration order
    edges: Vec<VersionEdge>,
    /// Outgoing edge indices per source version, in registration order
    adjacency: HashMap<String, Vec<usize>>,
}

impl VersionGraph {
    /// Create an empty graph
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema version
    ///
    /// # Errors
    /// `GraphError::DuplicateVersion` if the name is already registered.
    pub fn register_version(&mut self, version: SchemaVersion) -> Result<(), GraphError> {
        if self.versions.contains_key(&version.name) {
            return Err(GraphError::DuplicateVersion(version.name));
        }
        tracing::debug!(version = %version.name, "registered schema version");
        self.versions.insert(version.name.clone(), version);
        Ok(())
    }

    /// Register a directed edge between two registered versions
    ///
    /// # Errors
    /// `GraphError::VersionNotFound` if either endpoint is unregistered.
    pub fn register_edge(&mut self, edge: VersionEdge) -> Result<(), GraphError> {
        for endpoint in [&edge.from, &edge.to] {
            if !self.versions.contains_key(endpoint) {
                return Err(GraphError::VersionNotFound(endpoint.clone()));
            }
        }
        tracing::debug!(from = %edge.from, to = %edge.to, lossy = edge.lossy, "registered edge");
        let idx = self.edges.len();
        self.adjacency
            .entry(edge.from.clone())
            .or_default()
            .push(idx);
        self.edges.push(edge);
        Ok(())
    }

    /// All registered versions, in registration order
    #[must_use]
    pub fn versions(&self) -> Vec<&SchemaVersion> {
        self.versions.values().collect()
    }

    /// Look up a version record
    ///
    /// # Errors
    /// `GraphError::VersionNotFound` for unknown names.
    pub fn version_info(&self, name: &str) -> Result<&SchemaVersion, GraphError> {
        self.versions
            .get(name)
            .ok_or_else(|| GraphError::VersionNotFound(name.to_string()))
    }

    /// Deprecated field paths declared by a version
    ///
    /// # Errors
    /// `GraphError::VersionNotFound` for unknown names.
    pub fn deprecated_fields(&self, name: &str) -> Result<&[String], GraphError> {
        self.version_info(name)
            .map(|v| v.deprecated_fields.as_slice())
    }

    /// Whether a version is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.versions.contains_key(name)
    }

    /// Outgoing edges of a version, in registration order
    #[must_use]
    pub fn edges_from(&self, name: &str) -> Vec<&VersionEdge> {
        self.adjacency
            .get(name)
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Resolve a migration path between two versions
    ///
    /// Preference order: fewest hops, then fewest lossy edges, then edge
    /// registration order. Repeated calls for the same pair return an
    /// identical path.
    ///
    /// `from == to` on a registered version resolves to a no-op direct
    /// path with zero transformations.
    ///
    /// # Errors
    /// `GraphError::NoPathFound` when either endpoint is unregistered or
    /// the versions are disconnected.
    pub fn resolve_path(&self, from: &str, to: &str) -> Result<MigrationPath, GraphError> {
        let no_path = || GraphError::NoPathFound {
            from: from.to_string(),
            to: to.to_string(),
        };

        if !self.versions.contains_key(from) || !self.versions.contains_key(to) {
            return Err(no_path());
        }

        if from == to {
            return Ok(self.build_path(from, to, &[]));
        }

        let mut candidates: Vec<Vec<usize>> = Vec::new();
        let mut trail = Vec::new();
        self.collect_paths(from, from, to, &mut trail, &mut candidates);

        let best = candidates
            .into_iter()
            .min_by(|a, b| self.compare_candidates(a, b))
            .ok_or_else(no_path)?;

        Ok(self.build_path(from, to, &best))
    }

    /// Depth-first enumeration of simple paths (edge index sequences)
    ///
    /// Version graphs are small (one entry per published API revision), so
    /// exhaustive enumeration stays cheap and keeps tie-breaking exact.
    fn collect_paths(
        &self,
        start: &str,
        current: &str,
        to: &str,
        trail: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        let Some(indices) = self.adjacency.get(current) else {
            return;
        };
        for &idx in indices {
            let edge = &self.edges[idx];
            // Simple paths only: never revisit a version already on the trail
            let revisits =
                edge.to == start || trail.iter().any(|&i| self.edges[i].to == edge.to);
            if revisits {
                continue;
            }
            trail.push(idx);
            if edge.to == to {
                out.push(trail.clone());
            } else {
                self.collect_paths(start, &edge.to, to, trail, out);
            }
            trail.pop();
        }
    }

    /// Order candidates by (hops, lossy count, registration order)
    fn compare_candidates(&self, a: &[usize], b: &[usize]) -> std::cmp::Ordering {
        let lossy = |path: &[usize]| path.iter().filter(|&&i| self.edges[i].lossy).count();
        a.len()
            .cmp(&b.len())
            .then_with(|| lossy(a).cmp(&lossy(b)))
            .then_with(|| a.cmp(b))
    }

    /// Assemble a `MigrationPath` from an edge index sequence
    fn build_path(&self, from: &str, to: &str, indices: &[usize]) -> MigrationPath {
        let edges: Vec<VersionEdge> = indices.iter().map(|&i| self.edges[i].clone()).collect();
        let hops: Vec<String> = edges
            .iter()
            .map(|e| e.to.clone())
            .take(edges.len().saturating_sub(1))
            .collect();
        let lossy_count = edges.iter().filter(|e| e.lossy).count();
        let transformations = edges
            .iter()
            .flat_map(|e| e.transformations.iter().cloned())
            .collect();

        MigrationPath {
            from: from.to_string(),
            to: to.to_string(),
            direct: edges.len() <= 1,
            hops,
            data_loss_risk: lossy_count > 0,
            requires_manual: edges.iter().any(|e| e.requires_manual),
            complexity: classify(edges.len(), lossy_count),
            transformations,
            edges,
        }
    }
}

/// Classify path complexity from hop and lossy-edge counts
#[must_use]
fn classify(hops: usize, lossy: usize) -> Complexity {
    match (hops, lossy) {
        (0, _) | (1, 0) => Complexity::Low,
        (1, _) | (2, 0) => Complexity::Medium,
        _ => Complexity::High,
    }
}

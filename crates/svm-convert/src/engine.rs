//! Single-edge conversion engine
//!
//! Converts a resource across exactly one registered edge, delegating to
//! `FieldPreserver` for anything the target schema cannot represent.
//! Multi-hop conversion is the orchestrator composing repeated single-edge
//! calls; the engine itself never spans more than one edge, keeping its
//! correctness argument local and testable per edge.

use crate::error::ConvertError;
use crate::preserve::{FieldPreserver, PreservedDataEnvelope};
use crate::resource::{annotations, prune_field, set_field, Resource};
use serde_json::Value;
use std::sync::Arc;
use svm_graph::{GraphError, TransformationKind, VersionEdge, VersionGraph};

/// Result of converting a resource across one edge
#[derive(Debug, Clone)]
pub struct EdgeConversion {
    /// The converted resource, at the edge's target version
    pub resource: Resource,
    /// Envelope captured before conversion, if anything was preserved
    pub envelope: Option<PreservedDataEnvelope>,
}

/// Executes one-edge transformations of resources between adjacent versions
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    graph: Arc<VersionGraph>,
    preserver: FieldPreserver,
}

impl ConversionEngine {
    /// Create a new engine over a version graph
    #[inline]
    #[must_use]
    pub fn new(graph: Arc<VersionGraph>) -> Self {
        Self {
            graph,
            preserver: FieldPreserver::new(),
        }
    }

    /// The preserver used by this engine
    #[inline]
    #[must_use]
    pub fn preserver(&self) -> &FieldPreserver {
        &self.preserver
    }

    /// Convert a resource across a single edge
    ///
    /// Preservation runs before any field is discarded. When `prior` holds
    /// an envelope whose source version equals the edge's target version,
    /// the conversion is walking back toward where that envelope was
    /// captured and the envelope is restored into the result.
    ///
    /// # Errors
    /// - `ConvertError::VersionMismatch` when the resource is not at the
    ///   edge's source version
    /// - `ConvertError::UnknownVersion` when the edge's target version is
    ///   not registered
    /// - `ConvertError::IdentityMismatch` when `prior` belongs to another
    ///   resource
    pub fn convert_edge(
        &self,
        resource: &Resource,
        edge: &VersionEdge,
        prior: Option<&PreservedDataEnvelope>,
    ) -> Result<EdgeConversion, ConvertError> {
        if resource.api_version != edge.from {
            return Err(ConvertError::VersionMismatch {
                resource: resource.key.clone(),
                expected: edge.from.clone(),
                actual: resource.api_version.clone(),
            });
        }

        let target = self.graph.version_info(&edge.to).map_err(|err| match err {
            GraphError::VersionNotFound(name) => ConvertError::UnknownVersion(name),
            other => ConvertError::UnknownVersion(other.to_string()),
        })?;

        // Capture before anything is discarded
        let envelope = self.preserver.preserve(resource, edge, target);

        let mut converted = resource.clone();

        for transformation in &edge.transformations {
            let target_field = transformation
                .target_field
                .as_deref()
                .unwrap_or(&transformation.field);
            match transformation.kind {
                TransformationKind::Rename => {
                    if let Some(value) = prune_field(&mut converted.spec, &transformation.field) {
                        set_field(&mut converted.spec, target_field, value)?;
                    }
                }
                TransformationKind::Restructure => {
                    if prune_field(&mut converted.spec, &transformation.field).is_some() {
                        // The envelope holds the original value and its tag
                        if let Some(complex) = envelope.complex_fields.get(&transformation.field) {
                            set_field(&mut converted.spec, target_field, complex.encode()?)?;
                        }
                    }
                }
                TransformationKind::Remove => {
                    prune_field(&mut converted.spec, &transformation.field);
                }
                TransformationKind::Add => {
                    if !converted.has_field(&transformation.field) {
                        set_field(&mut converted.spec, &transformation.field, Value::Null)?;
                    }
                }
            }
        }

        // Unknown fields were preserved above; drop them from the result,
        // collapsing any objects the removals empty
        for path in envelope.unknown_fields.keys() {
            prune_field(&mut converted.spec, path);
        }

        converted.api_version = edge.to.clone();

        // Walking back toward a previously preserved version restores it
        if let Some(prior) = prior {
            if prior.source_version == edge.to {
                self.preserver.restore(&mut converted, prior)?;
            }
        }

        converted.set_annotation(annotations::LAST_CONVERSION_SOURCE_VERSION, &edge.from);
        if !envelope.is_empty() {
            converted.set_annotation(
                annotations::PRESERVED_FIELDS_SUMMARY,
                envelope.preserved_summary(),
            );
            converted.set_annotation(annotations::DATA_INTEGRITY_HASH, &envelope.integrity_hash);
            // The full envelope rides along on the resource itself
            converted.set_annotation(
                annotations::CONVERSION_DATA,
                serde_json::to_string(&envelope)?,
            );
        }
        if !envelope.unknown_fields.is_empty() {
            converted.set_annotation(
                annotations::UNKNOWN_FIELDS_SUMMARY,
                envelope.unknown_summary(),
            );
        }

        tracing::debug!(
            resource = %resource.key,
            from = %edge.from,
            to = %edge.to,
            preserved = envelope.preserved_field_count(),
            "converted resource across edge"
        );

        Ok(EdgeConversion {
            resource: converted,
            envelope: (!envelope.is_empty()).then_some(envelope),
        })
    }
}

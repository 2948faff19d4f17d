//! Field preservation across schema versions
//!
//! Captures everything a target schema cannot represent into a
//! `PreservedDataEnvelope` before conversion, and re-injects it when a
//! resource converts back toward its source version:
//! - Unknown fields: paths the target schema does not recognize
//! - Complex fields: recognized paths whose representation changes shape
//! - Labels and annotations: cross-version metadata, copied verbatim
//!
//! Re-applying an envelope to the resource it was captured from, when
//! converting back to the source version, reproduces the original bucket
//! contents byte-for-byte.

use crate::error::ConvertError;
use crate::resource::{annotations, get_field, leaf_paths, set_field, Resource, ResourceKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use svm_graph::{SchemaVersion, TransformationKind, VersionEdge};

/// Reversible encoding applied to a complex field in the target version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingTag {
    /// Scalar wrapped into a `{"value": ...}` object
    WrappedValue,
    /// Structured value flattened into a JSON string
    JsonString,
}

/// A recognized field whose representation differs between versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexField {
    /// Original value at the source version
    pub value: Value,
    /// Encoding used for the target-version representation
    pub encoding: EncodingTag,
    /// Field path in the target version
    pub target_field: String,
}

impl ComplexField {
    /// Pick the encoding for a source value
    #[inline]
    #[must_use]
    pub fn encoding_for(value: &Value) -> EncodingTag {
        if value.is_object() || value.is_array() {
            EncodingTag::JsonString
        } else {
            EncodingTag::WrappedValue
        }
    }

    /// Encode the value for the target version
    ///
    /// # Errors
    /// `ConvertError::Serialization` if the value cannot be stringified.
    pub fn encode(&self) -> Result<Value, ConvertError> {
        match self.encoding {
            EncodingTag::WrappedValue => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), self.value.clone());
                Ok(Value::Object(map))
            }
            EncodingTag::JsonString => Ok(Value::String(serde_json::to_string(&self.value)?)),
        }
    }
}

/// Captured data a target schema cannot represent
///
/// Keyed by resource identity, source version, and preservation timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreservedDataEnvelope {
    /// Identity the envelope was captured from
    pub resource: ResourceKey,
    /// Version the data was captured at
    pub source_version: String,
    /// Version the resource was being converted to
    pub target_version: String,
    /// Capture timestamp
    pub preserved_at: DateTime<Utc>,
    /// Fields unknown to the target schema, keyed by source path
    pub unknown_fields: BTreeMap<String, Value>,
    /// Fields requiring non-trivial re-encoding, keyed by source path
    pub complex_fields: BTreeMap<String, ComplexField>,
    /// User annotations, verbatim
    pub annotations: BTreeMap<String, String>,
    /// User labels, verbatim
    pub labels: BTreeMap<String, String>,
    /// sha256 over the four buckets
    pub integrity_hash: String,
}

impl PreservedDataEnvelope {
    /// Whether the envelope captured anything beyond metadata
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unknown_fields.is_empty()
            && self.complex_fields.is_empty()
            && self.annotations.is_empty()
            && self.labels.is_empty()
    }

    /// Number of preserved spec fields (unknown + complex)
    #[inline]
    #[must_use]
    pub fn preserved_field_count(&self) -> usize {
        self.unknown_fields.len() + self.complex_fields.len()
    }

    /// Comma-separated unknown field paths, for the provenance annotation
    #[must_use]
    pub fn unknown_summary(&self) -> String {
        self.unknown_fields
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Comma-separated preserved field paths, for the provenance annotation
    #[must_use]
    pub fn preserved_summary(&self) -> String {
        self.unknown_fields
            .keys()
            .chain(self.complex_fields.keys())
            .cloned()
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Verify the buckets against the stored integrity hash
    #[inline]
    #[must_use]
    pub fn verify_integrity(&self) -> bool {
        bucket_hash(
            &self.unknown_fields,
            &self.complex_fields,
            &self.annotations,
            &self.labels,
        ) == self.integrity_hash
    }
}

/// sha256 over the canonical JSON of the four buckets
///
/// `BTreeMap` ordering makes the serialization canonical.
fn bucket_hash(
    unknown: &BTreeMap<String, Value>,
    complex: &BTreeMap<String, ComplexField>,
    annotations: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
) -> String {
    let bytes = serde_json::to_vec(&(unknown, complex, annotations, labels))
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Extracts and re-injects data the target schema cannot represent
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldPreserver;

impl FieldPreserver {
    /// Create a new preserver
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Capture everything the target version cannot represent
    ///
    /// Walks the resource's spec depth-first. Leaf paths the target schema
    /// does not represent, and paths named by the edge's remove rules, go
    /// into the unknown bucket; paths named by restructure rules go into
    /// the complex bucket with a reversible encoding tag. Labels and
    /// annotations are copied verbatim regardless of schema.
    #[must_use]
    pub fn preserve(
        &self,
        resource: &Resource,
        edge: &VersionEdge,
        target: &SchemaVersion,
    ) -> PreservedDataEnvelope {
        let mut unknown_fields = BTreeMap::new();
        let mut complex_fields = BTreeMap::new();

        // Source paths the edge's rules carry forward under a new shape or
        // name; these are representable even when the target schema does
        // not list them under their source path.
        let carried: Vec<&str> = edge
            .transformations
            .iter()
            .filter(|t| {
                matches!(
                    t.kind,
                    TransformationKind::Rename | TransformationKind::Restructure
                )
            })
            .map(|t| t.field.as_str())
            .collect();
        let is_carried = |path: &str| {
            carried
                .iter()
                .any(|field| path == *field || path.starts_with(&format!("{field}.")))
        };

        for path in leaf_paths(&resource.spec) {
            if !target.represents(&path) && !is_carried(&path) {
                if let Some(value) = get_field(&resource.spec, &path) {
                    unknown_fields.insert(path, value.clone());
                }
            }
        }

        for transformation in &edge.transformations {
            match transformation.kind {
                TransformationKind::Remove => {
                    if let Some(value) = get_field(&resource.spec, &transformation.field) {
                        unknown_fields.insert(transformation.field.clone(), value.clone());
                    }
                }
                TransformationKind::Restructure => {
                    if let Some(value) = get_field(&resource.spec, &transformation.field) {
                        let target_field = transformation
                            .target_field
                            .clone()
                            .unwrap_or_else(|| transformation.field.clone());
                        complex_fields.insert(
                            transformation.field.clone(),
                            ComplexField {
                                encoding: ComplexField::encoding_for(value),
                                value: value.clone(),
                                target_field,
                            },
                        );
                    }
                }
                TransformationKind::Rename | TransformationKind::Add => {}
            }
        }

        let annotations = resource.annotations.clone();
        let labels = resource.labels.clone();
        let integrity_hash = bucket_hash(&unknown_fields, &complex_fields, &annotations, &labels);

        tracing::debug!(
            resource = %resource.key,
            source = %edge.from,
            target = %edge.to,
            unknown = unknown_fields.len(),
            complex = complex_fields.len(),
            "captured preservation envelope"
        );

        PreservedDataEnvelope {
            resource: resource.key.clone(),
            source_version: edge.from.clone(),
            target_version: edge.to.clone(),
            preserved_at: Utc::now(),
            unknown_fields,
            complex_fields,
            annotations,
            labels,
            integrity_hash,
        }
    }

    /// Re-apply an envelope's buckets into a resource
    ///
    /// Fields the resource already defines explicitly win over preserved
    /// data; preserved values only fill gaps.
    ///
    /// # Errors
    /// - `ConvertError::IdentityMismatch` when the envelope was captured
    ///   from a different resource identity
    /// - `ConvertError::IntegrityViolation` when the buckets no longer
    ///   match their hash
    pub fn restore(
        &self,
        resource: &mut Resource,
        envelope: &PreservedDataEnvelope,
    ) -> Result<(), ConvertError> {
        if envelope.resource != resource.key {
            return Err(ConvertError::IdentityMismatch {
                expected: envelope.resource.clone(),
                actual: resource.key.clone(),
            });
        }
        if !envelope.verify_integrity() {
            return Err(ConvertError::IntegrityViolation(envelope.resource.clone()));
        }

        let mut restored = 0usize;
        for (path, value) in &envelope.unknown_fields {
            restored += usize::from(self.restore_field(resource, path, value.clone()));
        }
        for (path, complex) in &envelope.complex_fields {
            restored += usize::from(self.restore_field(resource, path, complex.value.clone()));
        }
        for (key, value) in &envelope.annotations {
            resource
                .annotations
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        for (key, value) in &envelope.labels {
            resource
                .labels
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        tracing::debug!(
            resource = %resource.key,
            source = %envelope.source_version,
            restored,
            "restored preservation envelope"
        );
        Ok(())
    }

    /// Read back the envelope a conversion stored on the resource itself
    ///
    /// Conversions stamp the full envelope into the
    /// `svm.io/conversion-data` annotation. Returns `Ok(None)` when no
    /// envelope is stored.
    ///
    /// # Errors
    /// - `ConvertError::Serialization` when the stored envelope does not
    ///   parse
    /// - `ConvertError::IdentityMismatch` when it was captured from a
    ///   different resource identity
    /// - `ConvertError::IntegrityViolation` when its buckets no longer
    ///   match their hash
    pub fn recover(
        &self,
        resource: &Resource,
    ) -> Result<Option<PreservedDataEnvelope>, ConvertError> {
        let Some(raw) = resource.annotations.get(annotations::CONVERSION_DATA) else {
            return Ok(None);
        };
        let envelope: PreservedDataEnvelope = serde_json::from_str(raw)?;
        if envelope.resource != resource.key {
            return Err(ConvertError::IdentityMismatch {
                expected: envelope.resource,
                actual: resource.key.clone(),
            });
        }
        if !envelope.verify_integrity() {
            return Err(ConvertError::IntegrityViolation(envelope.resource));
        }
        Ok(Some(envelope))
    }

    /// Set a preserved field unless the resource defines it explicitly
    ///
    /// Returns whether the field was written. A write that fails because
    /// an ancestor is an explicit scalar counts as the explicit data
    /// winning, not an error.
    fn restore_field(&self, resource: &mut Resource, path: &str, value: Value) -> bool {
        if resource.has_field(path) {
            return false;
        }
        set_field(&mut resource.spec, path, value).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use svm_graph::Transformation;

    fn closed_target() -> SchemaVersion {
        SchemaVersion::new("v1beta1", Utc::now())
            .with_known_field("observability")
            .with_known_field("components")
    }

    fn sample_resource() -> Resource {
        Resource::new("v1alpha1", "ObservabilityPlatform", "monitoring", "prod")
            .with_spec(json!({
                "components": {"prometheus": {"enabled": true}},
                "legacyFoo": "keep-me"
            }))
            .with_label("env", "prod")
            .with_annotation("team", "sre")
    }

    #[test]
    fn preserve_captures_unknown_fields() {
        let preserver = FieldPreserver::new();
        let edge = VersionEdge::new("v1alpha1", "v1beta1").lossy();

        let envelope = preserver.preserve(&sample_resource(), &edge, &closed_target());

        assert_eq!(envelope.unknown_fields.get("legacyFoo"), Some(&json!("keep-me")));
        assert!(envelope.complex_fields.is_empty());
        assert_eq!(envelope.labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(envelope.annotations.get("team").map(String::as_str), Some("sre"));
        assert!(envelope.verify_integrity());
    }

    #[test]
    fn preserve_captures_removed_and_restructured_fields() {
        let preserver = FieldPreserver::new();
        let resource = Resource::new("v1alpha1", "Platform", "ns", "r").with_spec(json!({
            "monitoring": {"retention": "30d"},
            "prometheusConfig": "scrape_interval: 30s"
        }));
        let edge = VersionEdge::new("v1alpha1", "v1beta1")
            .with_transformation(Transformation::remove("monitoring.retention", "dropped"))
            .with_transformation(Transformation::restructure(
                "prometheusConfig",
                "prometheus.configuration",
                "string config becomes structured",
            ));

        // Open target schema: only rule-named fields are preserved
        let target = SchemaVersion::new("v1beta1", Utc::now());
        let envelope = preserver.preserve(&resource, &edge, &target);

        assert_eq!(
            envelope.unknown_fields.get("monitoring.retention"),
            Some(&json!("30d"))
        );
        let complex = envelope.complex_fields.get("prometheusConfig").unwrap();
        assert_eq!(complex.encoding, EncodingTag::WrappedValue);
        assert_eq!(complex.target_field, "prometheus.configuration");
    }

    #[test]
    fn complex_field_encoding_round_trips() {
        let structured = ComplexField {
            value: json!({"scrape": "30s"}),
            encoding: ComplexField::encoding_for(&json!({"scrape": "30s"})),
            target_field: "cfg".to_string(),
        };
        assert_eq!(structured.encoding, EncodingTag::JsonString);
        let encoded = structured.encode().unwrap();
        let decoded: Value = serde_json::from_str(encoded.as_str().unwrap()).unwrap();
        assert_eq!(decoded, structured.value);

        let scalar = ComplexField {
            value: json!(42),
            encoding: ComplexField::encoding_for(&json!(42)),
            target_field: "cfg".to_string(),
        };
        assert_eq!(scalar.encoding, EncodingTag::WrappedValue);
        assert_eq!(scalar.encode().unwrap(), json!({"value": 42}));
    }

    #[test]
    fn restore_round_trips_buckets() {
        let preserver = FieldPreserver::new();
        let original = sample_resource();
        let edge = VersionEdge::new("v1alpha1", "v1beta1").lossy();
        let envelope = preserver.preserve(&original, &edge, &closed_target());

        // Converted resource lost the unknown field and user metadata
        let mut converted = Resource::new("v1beta1", "ObservabilityPlatform", "monitoring", "prod")
            .with_spec(json!({"components": {"prometheus": {"enabled": true}}}));

        preserver.restore(&mut converted, &envelope).unwrap();

        assert_eq!(converted.field("legacyFoo"), Some(&json!("keep-me")));
        assert_eq!(converted.labels, original.labels);
        assert_eq!(converted.annotations, original.annotations);

        // Capturing again reproduces the original buckets exactly
        let again = preserver.preserve(&converted, &edge, &closed_target());
        assert_eq!(again.unknown_fields, envelope.unknown_fields);
        assert_eq!(again.labels, envelope.labels);
        assert_eq!(again.annotations, envelope.annotations);
    }

    #[test]
    fn restore_explicit_data_wins() {
        let preserver = FieldPreserver::new();
        let edge = VersionEdge::new("v1alpha1", "v1beta1");
        let envelope = preserver.preserve(&sample_resource(), &edge, &closed_target());

        let mut target = Resource::new("v1beta1", "ObservabilityPlatform", "monitoring", "prod")
            .with_spec(json!({"legacyFoo": "explicit"}))
            .with_label("env", "staging");

        preserver.restore(&mut target, &envelope).unwrap();

        assert_eq!(target.field("legacyFoo"), Some(&json!("explicit")));
        assert_eq!(target.labels.get("env").map(String::as_str), Some("staging"));
    }

    #[test]
    fn recover_without_stored_data_is_none() {
        let preserver = FieldPreserver::new();
        assert!(preserver.recover(&sample_resource()).unwrap().is_none());
    }

    #[test]
    fn recover_rejects_a_tampered_annotation() {
        let preserver = FieldPreserver::new();
        let edge = VersionEdge::new("v1alpha1", "v1beta1").lossy();
        let mut envelope = preserver.preserve(&sample_resource(), &edge, &closed_target());
        envelope
            .unknown_fields
            .insert("injected".to_string(), json!("oops"));

        let resource = sample_resource().with_annotation(
            annotations::CONVERSION_DATA,
            serde_json::to_string(&envelope).unwrap(),
        );
        let err = preserver.recover(&resource).unwrap_err();
        assert!(matches!(err, ConvertError::IntegrityViolation(_)));
    }

    #[test]
    fn restore_rejects_identity_mismatch() {
        let preserver = FieldPreserver::new();
        let edge = VersionEdge::new("v1alpha1", "v1beta1");
        let envelope = preserver.preserve(&sample_resource(), &edge, &closed_target());

        let mut other = Resource::new("v1beta1", "ObservabilityPlatform", "monitoring", "other");
        let err = preserver.restore(&mut other, &envelope).unwrap_err();
        assert!(matches!(err, ConvertError::IdentityMismatch { .. }));
    }

    #[test]
    fn restore_rejects_tampered_envelope() {
        let preserver = FieldPreserver::new();
        let edge = VersionEdge::new("v1alpha1", "v1beta1");
        let mut envelope = preserver.preserve(&sample_resource(), &edge, &closed_target());
        envelope
            .unknown_fields
            .insert("injected".to_string(), json!("oops"));

        let mut resource = sample_resource();
        let err = preserver.restore(&mut resource, &envelope).unwrap_err();
        assert!(matches!(err, ConvertError::IntegrityViolation(_)));
    }
}

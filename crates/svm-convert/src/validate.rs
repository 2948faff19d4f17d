//! Resource validation against a target schema version
//!
//! Validation never mutates its input. Only hard schema violations make a
//! result invalid; deprecated-field usage and data-loss risk surface as
//! warnings and metrics so a migration can proceed deliberately — the
//! decision to abort on warnings belongs to the caller.

use crate::error::ConvertError;
use crate::resource::{leaf_paths, Resource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use svm_graph::{GraphError, VersionGraph};

/// Hard validation error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    /// A field the target schema requires is absent
    MissingRequiredField,
    /// A field is present but malformed (e.g. null where a value is required)
    MalformedField,
    /// A value violates a declared constraint
    ConstraintViolation,
}

/// One hard validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Error category
    pub kind: ValidationErrorKind,
    /// Dotted field path
    pub field_path: String,
    /// Human-readable detail
    pub detail: String,
}

/// Quantitative validation metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    /// Leaf fields inspected
    pub fields_validated: usize,
    /// Fields with hard errors
    pub fields_with_errors: usize,
    /// Fields with warnings
    pub fields_with_warnings: usize,
    /// Deprecated fields in use
    pub deprecated_fields: usize,
    /// Fields at risk of data loss (present but unknown to the target)
    pub data_loss_fields: usize,
}

/// Outcome of validating a resource against a target version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// False only for hard errors
    pub valid: bool,
    /// Hard errors, in discovery order
    pub errors: Vec<ValidationError>,
    /// Warnings, in discovery order
    pub warnings: Vec<String>,
    /// Quantitative metrics
    pub metrics: ValidationMetrics,
}

impl ValidationResult {
    /// Whether any warnings were raised
    #[inline]
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validates resources against target schema versions
#[derive(Debug, Clone)]
pub struct Validator {
    graph: Arc<VersionGraph>,
}

impl Validator {
    /// Create a validator over a version graph
    #[inline]
    #[must_use]
    pub fn new(graph: Arc<VersionGraph>) -> Self {
        Self { graph }
    }

    /// Validate a resource against a target version
    ///
    /// # Errors
    /// `ConvertError::UnknownVersion` when the target is unregistered.
    pub fn validate(
        &self,
        resource: &Resource,
        target_version: &str,
    ) -> Result<ValidationResult, ConvertError> {
        let target = self
            .graph
            .version_info(target_version)
            .map_err(|err| match err {
                GraphError::VersionNotFound(name) => ConvertError::UnknownVersion(name),
                other => ConvertError::UnknownVersion(other.to_string()),
            })?;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut metrics = ValidationMetrics::default();

        let paths = leaf_paths(&resource.spec);
        metrics.fields_validated = paths.len();

        for required in &target.required_fields {
            match resource.field(required) {
                None => errors.push(ValidationError {
                    kind: ValidationErrorKind::MissingRequiredField,
                    field_path: required.clone(),
                    detail: format!("required by {target_version}"),
                }),
                Some(value) if value.is_null() => errors.push(ValidationError {
                    kind: ValidationErrorKind::MalformedField,
                    field_path: required.clone(),
                    detail: "required field is null".to_string(),
                }),
                Some(_) => {}
            }
        }

        for path in &paths {
            // Replica-style counters must be non-negative integers
            if path.rsplit('.').next() == Some("replicas") {
                if let Some(value) = resource.field(path) {
                    if !value.is_u64() {
                        errors.push(ValidationError {
                            kind: ValidationErrorKind::ConstraintViolation,
                            field_path: path.clone(),
                            detail: format!("replicas must be a non-negative integer, got {value}"),
                        });
                    }
                }
            }

            if !target.represents(path) {
                warnings.push(format!(
                    "field {path} is not representable in {target_version} and will be preserved out-of-band"
                ));
                metrics.data_loss_fields += 1;
                metrics.fields_with_warnings += 1;
            }
        }

        for deprecated in &target.deprecated_fields {
            if resource.has_field(deprecated) {
                warnings.push(format!(
                    "field {deprecated} is deprecated in {target_version}"
                ));
                metrics.deprecated_fields += 1;
                metrics.fields_with_warnings += 1;
            }
        }

        if target.deprecated {
            let detail = target
                .deprecation_message
                .as_deref()
                .unwrap_or("no replacement noted");
            warnings.push(format!(
                "target version {target_version} is deprecated: {detail}"
            ));
        }

        metrics.fields_with_errors = errors.len();

        tracing::debug!(
            resource = %resource.key,
            target = target_version,
            errors = errors.len(),
            warnings = warnings.len(),
            "validated resource"
        );

        Ok(ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            metrics,
        })
    }
}

//! Pre-migration analysis
//!
//! Read-only assessment of a set of resources against a target version.
//! Analysis never mutates anything and never fails on individual
//! resources; problems surface as warnings so operators can review the
//! whole picture before committing to a migration.

use serde::{Deserialize, Serialize};
use svm_convert::ResourceKey;
use svm_graph::Complexity;

/// Assessment of one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAssessment {
    /// Resource identity
    pub resource: ResourceKey,
    /// Version currently stored on the resource, when it could be read
    pub current_version: Option<String>,
    /// Whether a conversion would run for this resource
    pub needs_migration: bool,
    /// Path complexity, when a path resolved
    pub complexity: Option<Complexity>,
    /// Whether the resolved path crosses a lossy edge
    pub data_loss_risk: bool,
    /// Whether the resolved path requires manual intervention
    pub requires_manual: bool,
    /// Whether the resource currently fails hard validation for the target
    pub invalid: bool,
    /// Per-resource warnings, in discovery order
    pub warnings: Vec<String>,
}

/// Aggregate pre-migration analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Requested target version
    pub target_version: String,
    /// Resources assessed
    pub total: usize,
    /// Resources that would be converted
    pub needs_migration: usize,
    /// Resources already carrying the target version
    pub already_at_target: usize,
    /// Resources for which no migration path resolved or the store read failed
    pub unresolved: usize,
    /// Resources currently failing hard validation for the target
    pub invalid: usize,
    /// Resources whose path crosses a lossy edge
    pub data_loss_risk: usize,
    /// Resources whose path requires manual intervention
    pub requires_manual: usize,
    /// Per-resource assessments, in input order
    pub assessments: Vec<ResourceAssessment>,
}

impl AnalysisReport {
    /// Create an empty report for a target version
    #[must_use]
    pub fn new(target_version: impl Into<String>) -> Self {
        Self {
            target_version: target_version.into(),
            total: 0,
            needs_migration: 0,
            already_at_target: 0,
            unresolved: 0,
            invalid: 0,
            data_loss_risk: 0,
            requires_manual: 0,
            assessments: Vec::new(),
        }
    }

    /// Fold one assessment into the aggregate counters
    pub fn push(&mut self, assessment: ResourceAssessment) {
        self.total += 1;
        if assessment.needs_migration {
            self.needs_migration += 1;
        } else if assessment.current_version.as_deref()
            == Some(self.target_version.as_str())
        {
            self.already_at_target += 1;
        } else {
            self.unresolved += 1;
        }
        if assessment.invalid {
            self.invalid += 1;
        }
        if assessment.data_loss_risk {
            self.data_loss_risk += 1;
        }
        if assessment.requires_manual {
            self.requires_manual += 1;
        }
        self.assessments.push(assessment);
    }

    /// All warnings across assessments, in input order
    #[must_use]
    pub fn warnings(&self) -> Vec<&str> {
        self.assessments
            .iter()
            .flat_map(|a| a.warnings.iter().map(String::as_str))
            .collect()
    }

    /// Whether the whole set can migrate without review
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unresolved == 0
            && self.invalid == 0
            && self.data_loss_risk == 0
            && self.requires_manual == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(name: &str) -> ResourceAssessment {
        ResourceAssessment {
            resource: ResourceKey::new("ns", name),
            current_version: Some("v1alpha1".to_string()),
            needs_migration: true,
            complexity: Some(Complexity::Low),
            data_loss_risk: false,
            requires_manual: false,
            invalid: false,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn counters_aggregate_assessments() {
        let mut report = AnalysisReport::new("v1beta1");
        report.push(assessment("a"));

        let mut at_target = assessment("b");
        at_target.needs_migration = false;
        at_target.current_version = Some("v1beta1".to_string());
        report.push(at_target);

        let mut lossy = assessment("c");
        lossy.data_loss_risk = true;
        lossy.warnings.push("path crosses a lossy edge".to_string());
        report.push(lossy);

        assert_eq!(report.total, 3);
        assert_eq!(report.needs_migration, 2);
        assert_eq!(report.already_at_target, 1);
        assert_eq!(report.data_loss_risk, 1);
        assert!(!report.is_clean());
        assert_eq!(report.warnings().len(), 1);
    }

    #[test]
    fn unreadable_resource_counts_as_unresolved() {
        let mut report = AnalysisReport::new("v1beta1");
        report.push(ResourceAssessment {
            resource: ResourceKey::new("ns", "ghost"),
            current_version: None,
            needs_migration: false,
            complexity: None,
            data_loss_risk: false,
            requires_manual: false,
            invalid: false,
            warnings: vec!["resource not found: ns/ghost".to_string()],
        });

        assert_eq!(report.unresolved, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn clean_report() {
        let mut report = AnalysisReport::new("v1beta1");
        report.push(assessment("a"));
        assert!(report.is_clean());
    }
}

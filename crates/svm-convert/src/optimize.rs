//! Advisory conversion optimizer
//!
//! Inspects resources and recommends non-semantic execution strategies:
//! skip subtrees unchanged since the last recorded conversion, defer
//! oversized subtrees, and batch resources sharing an identical spec
//! shape. Suggestions are advisory; the orchestrator may ignore any or
//! all of them without correctness impact.

use crate::resource::{Resource, ResourceKey};
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Optimizer tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    /// Byte threshold above which a top-level subtree is flagged for
    /// deferred handling
    pub large_subtree_bytes: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            large_subtree_bytes: 64 * 1024,
        }
    }
}

/// Suggests execution strategies that reduce conversion cost
#[derive(Debug, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
    /// Spec content hash recorded at each resource's last conversion
    last_converted: Mutex<HashMap<ResourceKey, String>>,
    /// Occurrences of each spec shape seen so far
    shapes_seen: Mutex<HashMap<String, usize>>,
}

impl Optimizer {
    /// Create an optimizer with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an optimizer with explicit configuration
    #[inline]
    #[must_use]
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Record that a resource was converted with its current spec
    pub fn record_conversion(&self, resource: &Resource) {
        self.last_converted
            .lock()
            .insert(resource.key.clone(), content_hash(&resource.spec));
    }

    /// Advisory suggestions for converting a resource
    #[must_use]
    pub fn suggest(&self, resource: &Resource) -> Vec<String> {
        let mut suggestions = Vec::new();

        let hash = content_hash(&resource.spec);
        if self.last_converted.lock().get(&resource.key) == Some(&hash) {
            suggestions.push(format!(
                "skip {}: spec unchanged since last recorded conversion",
                resource.key
            ));
        }

        if let Some(map) = resource.spec.as_object() {
            for (field, subtree) in map {
                let size = serde_json::to_vec(subtree).map(|v| v.len()).unwrap_or(0);
                if size > self.config.large_subtree_bytes {
                    suggestions.push(format!(
                        "defer subtree {field}: {size} bytes exceeds the {} byte threshold",
                        self.config.large_subtree_bytes
                    ));
                }
            }
        }

        let shape = shape_of(&resource.spec);
        let seen = {
            let mut shapes = self.shapes_seen.lock();
            let count = shapes.entry(shape).or_insert(0);
            *count += 1;
            *count
        };
        if seen > 1 {
            suggestions.push(format!(
                "batch {}: {} resources seen with an identical spec shape",
                resource.key, seen
            ));
        }

        suggestions
    }
}

/// sha256 over the canonical JSON serialization
fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(value).unwrap_or_default());
    hex::encode(hasher.finalize())
}

/// Structure-only fingerprint: keys and value kinds, values erased
fn shape_of(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(key, child)| format!("{key}:{}", shape_of(child)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(_) => "[]".to_string(),
        Value::String(_) => "s".to_string(),
        Value::Number(_) => "n".to_string(),
        Value::Bool(_) => "b".to_string(),
        Value::Null => "0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unchanged_spec_suggests_skip() {
        let optimizer = Optimizer::new();
        let resource = Resource::new("v1alpha1", "Platform", "ns", "demo")
            .with_spec(json!({"components": {"grafana": true}}));

        assert!(optimizer.suggest(&resource).is_empty());

        optimizer.record_conversion(&resource);
        let suggestions = optimizer.suggest(&resource);
        assert!(suggestions.iter().any(|s| s.contains("unchanged")));
    }

    #[test]
    fn changed_spec_does_not_suggest_skip() {
        let optimizer = Optimizer::new();
        let resource = Resource::new("v1alpha1", "Platform", "ns", "demo")
            .with_spec(json!({"a": 1}));
        optimizer.record_conversion(&resource);

        let changed = resource.clone().with_spec(json!({"a": 2}));
        assert!(!optimizer
            .suggest(&changed)
            .iter()
            .any(|s| s.contains("unchanged")));
    }

    #[test]
    fn oversized_subtree_suggests_deferral() {
        let optimizer = Optimizer::with_config(OptimizerConfig {
            large_subtree_bytes: 32,
        });
        let resource = Resource::new("v1alpha1", "Platform", "ns", "demo").with_spec(json!({
            "small": 1,
            "big": "x".repeat(64)
        }));

        let suggestions = optimizer.suggest(&resource);
        assert!(suggestions.iter().any(|s| s.contains("defer subtree big")));
        assert!(!suggestions.iter().any(|s| s.contains("small")));
    }

    #[test]
    fn identical_shapes_suggest_batching() {
        let optimizer = Optimizer::new();
        let first = Resource::new("v1alpha1", "Platform", "ns", "a")
            .with_spec(json!({"components": {"replicas": 1}}));
        let second = Resource::new("v1alpha1", "Platform", "ns", "b")
            .with_spec(json!({"components": {"replicas": 5}}));
        let different = Resource::new("v1alpha1", "Platform", "ns", "c")
            .with_spec(json!({"other": true}));

        assert!(optimizer.suggest(&first).is_empty());
        assert!(optimizer
            .suggest(&second)
            .iter()
            .any(|s| s.contains("identical spec shape")));
        assert!(optimizer.suggest(&different).is_empty());
    }
}

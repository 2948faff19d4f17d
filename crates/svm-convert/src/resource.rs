//! Unstructured resource model
//!
//! Managed resources are carried as untyped JSON trees plus the metadata
//! the engine cares about (identity, version, labels, annotations). The
//! engine never assumes a concrete schema; field access goes through
//! dotted-path helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Provenance annotation keys written onto migrated resources
///
/// Plain string values attached to the resource's own metadata so that
/// conversion provenance survives independently of the engine's task and
/// history records.
pub mod annotations {
    /// Version the resource was last converted from
    pub const LAST_CONVERSION_SOURCE_VERSION: &str = "svm.io/last-conversion-source-version";
    /// Summary of fields captured into the preservation envelope
    pub const PRESERVED_FIELDS_SUMMARY: &str = "svm.io/preserved-fields";
    /// Summary of fields unknown to the target schema
    pub const UNKNOWN_FIELDS_SUMMARY: &str = "svm.io/unknown-fields";
    /// sha256 over the preservation envelope's buckets
    pub const DATA_INTEGRITY_HASH: &str = "svm.io/data-integrity-hash";
    /// Full preservation envelope, serialized as JSON
    ///
    /// Stored on the resource itself so preserved data survives engine
    /// restarts and travels with the resource through external stores.
    pub const CONVERSION_DATA: &str = "svm.io/conversion-data";
}

/// Namespace/name identity of a managed resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Namespace the resource lives in
    pub namespace: String,
    /// Resource name, unique within the namespace
    pub name: String,
}

impl ResourceKey {
    /// Create a new key
    #[inline]
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One managed resource instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Declared schema version, e.g. "v1alpha1"
    pub api_version: String,
    /// Resource kind
    pub kind: String,
    /// Identity
    pub key: ResourceKey,
    /// User labels (cross-version metadata by convention)
    pub labels: BTreeMap<String, String>,
    /// User annotations (cross-version metadata by convention)
    pub annotations: BTreeMap<String, String>,
    /// Declared spec payload
    pub spec: Value,
}

impl Resource {
    /// Create a new resource with an empty spec
    #[inline]
    #[must_use]
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            key: ResourceKey::new(namespace, name),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            spec: Value::Object(serde_json::Map::new()),
        }
    }

    /// With spec payload
    #[inline]
    #[must_use]
    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    /// With a label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// With an annotation
    #[inline]
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Set an annotation in place
    #[inline]
    pub fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(key.into(), value.into());
    }

    /// Read a spec field by dotted path
    #[inline]
    #[must_use]
    pub fn field(&self, path: &str) -> Option<&Value> {
        get_field(&self.spec, path)
    }

    /// Whether a spec field exists
    #[inline]
    #[must_use]
    pub fn has_field(&self, path: &str) -> bool {
        self.field(path).is_some()
    }
}

/// Read a value by dotted path
#[must_use]
pub fn get_field<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Remove and return a value by dotted path
///
/// Intermediate objects left empty by the removal stay in place; the tree
/// shape above the removed leaf is not collapsed.
pub fn take_field(root: &mut Value, path: &str) -> Option<Value> {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    loop {
        let segment = segments.next()?;
        let map = current.as_object_mut()?;
        if segments.peek().is_none() {
            return map.remove(segment);
        }
        current = map.get_mut(segment)?;
    }
}

/// Remove a value by dotted path, collapsing objects the removal empties
///
/// Like `take_field`, but ancestor objects left empty by the removal are
/// removed too, deepest first, so no hollow `{}` shells remain in the tree.
pub fn prune_field(root: &mut Value, path: &str) -> Option<Value> {
    let removed = take_field(root, path)?;
    let segments: Vec<&str> = path.split('.').collect();
    for depth in (1..segments.len()).rev() {
        let parent = segments[..depth].join(".");
        match get_field(root, &parent) {
            Some(Value::Object(map)) if map.is_empty() => {
                take_field(root, &parent);
            }
            _ => break,
        }
    }
    Some(removed)
}

/// Write a value by dotted path, creating intermediate objects
///
/// Fails when an intermediate segment exists but is not an object.
pub fn set_field(root: &mut Value, path: &str, value: Value) -> Result<(), crate::ConvertError> {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        let map = current
            .as_object_mut()
            .ok_or_else(|| crate::ConvertError::FieldPath(path.to_string()))?;
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return Ok(());
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    Err(crate::ConvertError::FieldPath(path.to_string()))
}

/// Collect all leaf field paths under a JSON tree, depth-first
///
/// Arrays and scalars are leaves; empty objects are leaves too so that
/// their presence survives preservation.
#[must_use]
pub fn leaf_paths(root: &Value) -> Vec<String> {
    let mut out = Vec::new();
    walk("", root, &mut out);
    out
}

fn walk(prefix: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                walk(&path, child, out);
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.push(prefix.to_string());
            }
        }
    }
}

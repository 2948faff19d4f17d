//! SVM Convert - Resource conversion with lossless preservation
//!
//! Converts unstructured managed resources across single version-graph
//! edges:
//! - `FieldPreserver` captures anything the target schema cannot represent
//! - `ConversionEngine` applies one edge's transformation rules
//! - `Validator` gates conversion with errors, warnings, and metrics
//! - `Optimizer` recommends non-semantic execution strategies
//!
//! # Example
//!
//! ```rust,ignore
//! use svm_convert::{ConversionEngine, Resource};
//!
//! let engine = ConversionEngine::new(graph);
//! let conversion = engine.convert_edge(&resource, &edge, None)?;
//! assert_eq!(conversion.resource.api_version, edge.to);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod engine;
pub mod error;
pub mod optimize;
pub mod preserve;
pub mod resource;
pub mod validate;

pub use engine::{ConversionEngine, EdgeConversion};
pub use error::ConvertError;
pub use optimize::{Optimizer, OptimizerConfig};
pub use preserve::{ComplexField, EncodingTag, FieldPreserver, PreservedDataEnvelope};
pub use resource::{annotations, Resource, ResourceKey};
pub use validate::{
    ValidationError, ValidationErrorKind, ValidationMetrics, ValidationResult, Validator,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#![deny(missing_docs)]

//! # OpenAPI Module
//!
//! Load-time half of the engine.
//!
//! - **schema**: raw Schema Object model.
//! - **refs**: `$ref` resolution with cycle detection.
//! - **descriptor**: normalized, composition-free types.
//! - **normalizer**: schema node to descriptor.
//! - **resolver**: parameters, bodies and responses of one operation.
//! - **operations**: the immutable operation set of a document.

pub mod descriptor;
pub mod models;
pub mod normalizer;
pub mod operations;
pub(crate) mod ref_utils;
pub mod refs;
pub mod resolver;
pub mod schema;

pub use descriptor::{Additional, Annotations, Constraints, PrimitiveKind, TypeDescriptor, TypeShape};
pub use models::{EffectiveDefault, HttpMethod, MediaType, ParamLocation, ParamStyle, ResponseKey};
pub use normalizer::{normalize, Normalizer};
pub use operations::{OperationModel, OperationSet};
pub use refs::{ResolvedRefs, Resolver};
pub use schema::{SchemaNode, SchemaOrRef};

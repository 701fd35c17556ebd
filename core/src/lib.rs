#![deny(missing_docs)]

//! # OAS Bind Core
//!
//! Schema resolution and type projection for OpenAPI 3.0 documents.
//!
//! A document is loaded once into an immutable [`OperationSet`]. Each
//! [`OperationModel`] then binds request parameters, validates request bodies
//! and serializes responses without further access to the document.

/// Shared error types.
pub mod error;

/// Engine configuration.
pub mod config;

/// Load-time document model.
pub mod oas;

/// Request-time binding and validation.
pub mod runtime;

/// Handler signature projection.
pub mod signature;

/// Hot-reloadable contract holder.
pub mod store;

pub use config::EngineConfig;
pub use error::{
    CoercionError, SpecError, SpecResult, SpecWarning, ValidationError, ValidationResult,
    WarningKind,
};
pub use oas::{
    normalize, EffectiveDefault, HttpMethod, MediaType, OperationModel, OperationSet,
    ParamLocation, ParamStyle, PrimitiveKind, SchemaNode, TypeDescriptor, TypeShape,
};
pub use runtime::{deserialize, serialize_parameter, Direction, RawRequest};
pub use signature::{project_operation_signature, ArgumentSource, SignatureEntry};
pub use store::ContractStore;

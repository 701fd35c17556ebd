//! # Error Handling
//!
//! Two families of failure exist and never mix:
//!
//! - [`SpecError`]: the OAS document itself is broken. Raised while an
//!   [`OperationSet`](crate::OperationSet) is being built and fatal to that load.
//! - [`ValidationError`]: a live request or response value does not satisfy a
//!   loaded contract. Raised per call and recoverable by the caller.
//!
//! Non-fatal findings at load time are reported as [`SpecWarning`] values.

use crate::oas::descriptor::TypeDescriptor;
use crate::oas::models::ParamLocation;
use derive_more::{Display, From};

/// Load-time failure. Any of these aborts construction of the whole operation set.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum SpecError {
    /// A `$ref` chain re-entered a pointer that was still being resolved.
    #[display("Cyclic reference: {}", cycle.join(" -> "))]
    CyclicReference {
        /// Pointers in the order they were entered, ending with the repeated one.
        cycle: Vec<String>,
    },

    /// A `$ref` that points outside the loaded document.
    #[display("Unsupported reference '{reference}': only local JSON pointers are resolved")]
    UnsupportedReference {
        /// The raw `$ref` value.
        reference: String,
    },

    /// A local `$ref` whose target does not exist.
    #[display("Unresolved reference '{reference}'")]
    UnresolvedReference {
        /// The raw `$ref` value.
        reference: String,
    },

    /// The document contradicts itself.
    #[display("Inconsistent document at {at}: {reason}")]
    Inconsistency {
        /// JSON pointer or operation locator of the offending element.
        at: String,
        /// Human readable cause.
        reason: String,
    },

    /// The document does not have the shape of an OAS 3.0 document.
    #[display("Invalid document: {_0}")]
    InvalidDocument(String),
}

impl std::error::Error for SpecError {}

/// Result alias for load-time operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// A raw parameter value that could not be converted to its declared type.
#[derive(Debug, Clone, PartialEq, Display)]
#[display("Cannot coerce parameter '{parameter}' from {raw:?} to {expected}: {reason}")]
pub struct CoercionError {
    /// Parameter name.
    pub parameter: String,
    /// Descriptor the value was coerced against.
    pub expected: TypeDescriptor,
    /// Raw input as received (multiple occurrences joined with `&`).
    pub raw: String,
    /// Why the conversion failed.
    pub reason: String,
}

impl std::error::Error for CoercionError {}

/// Request/response-time failure.
#[derive(Debug, Clone, PartialEq, Display, From)]
pub enum ValidationError {
    /// Raw text did not parse as the declared type.
    #[from]
    #[display("{_0}")]
    Coercion(CoercionError),

    /// A required parameter was not supplied.
    #[display("Missing required {location} parameter '{parameter}'")]
    MissingParameter {
        /// Parameter name.
        parameter: String,
        /// Where it was expected.
        location: ParamLocation,
    },

    /// An explicit null for a parameter that is not nullable.
    #[display("Parameter '{parameter}' is not nullable")]
    InvalidNull {
        /// Parameter name.
        parameter: String,
    },

    /// The caller supplied a response-only property.
    #[display("Property '{path}' is read-only")]
    ReadOnlyViolation {
        /// Location of the property inside the payload.
        path: String,
    },

    /// More than one `oneOf` branch accepted the value.
    #[display("Value at '{path}' matches {matched} oneOf branches, expected exactly one")]
    AmbiguousOneOf {
        /// Location of the value.
        path: String,
        /// Number of accepting branches.
        matched: usize,
    },

    /// No `oneOf`/`anyOf` branch accepted the value.
    #[display("Value at '{path}' matches none of the {branches} alternatives")]
    NoMatch {
        /// Location of the value.
        path: String,
        /// Number of branches tried.
        branches: usize,
    },

    /// A structural or constraint check failed.
    #[display("Schema violation at '{path}': {message}")]
    Schema {
        /// Location of the value.
        path: String,
        /// What was violated.
        message: String,
    },

    /// The operation requires a body and none was sent.
    #[display("Request body is required")]
    MissingBody,

    /// The body's content type is not declared by the operation.
    #[display("Unsupported media type '{content_type}'")]
    UnsupportedMediaType {
        /// Content type supplied by the caller.
        content_type: String,
    },

    /// The payload is not valid JSON.
    #[display("Malformed JSON: {_0}")]
    MalformedJson(String),

    /// The response status has no declared response and there is no `default`.
    #[display("Status {status} is not declared for this operation")]
    UndeclaredStatus {
        /// HTTP status code.
        status: u16,
    },

    /// A query parameter the operation does not declare.
    #[display("Unexpected query parameter '{parameter}'")]
    UnexpectedParameter {
        /// Parameter name.
        parameter: String,
    },
}

impl std::error::Error for ValidationError {}

/// Result alias for request-time operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Kind of a non-fatal load finding.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum WarningKind {
    /// Two `allOf` members declare the same property with different types.
    /// The first declaration wins.
    #[display("allOf members declare property '{property}' with conflicting types")]
    PropertyConflict {
        /// Property name.
        property: String,
    },

    /// Two `allOf` array members disagree on their item type.
    #[display("allOf array members declare conflicting item types")]
    ElementConflict,

    /// A required parameter declares a default that can never be observed.
    #[display("parameter '{parameter}' is required, its default can never apply")]
    UnobservableDefault {
        /// Parameter name.
        parameter: String,
    },
}

/// A non-fatal load finding. Fatal instead when strict mode is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{at}: {kind}")]
pub struct SpecWarning {
    /// JSON pointer or operation locator.
    pub at: String,
    /// What was found.
    pub kind: WarningKind,
}

impl SpecWarning {
    /// Promotes the warning to a fatal inconsistency.
    pub fn into_error(self) -> SpecError {
        SpecError::Inconsistency {
            at: self.at,
            reason: self.kind.to_string(),
        }
    }
}

#![deny(missing_docs)]

//! # Operation Signatures
//!
//! A stable, serializable projection of an operation's inputs, meant for
//! comparing against a handler's declared argument types without redoing
//! normalization.

use crate::oas::descriptor::TypeDescriptor;
use crate::oas::models::{EffectiveDefault, ParamLocation};
use crate::oas::operations::OperationModel;
use derive_more::Display;
use serde::Serialize;

/// Where an argument comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentSource {
    /// Path template variable.
    #[display("path")]
    Path,
    /// Query string.
    #[display("query")]
    Query,
    /// Request header.
    #[display("header")]
    Header,
    /// Cookie.
    #[display("cookie")]
    Cookie,
    /// Request body.
    #[display("body")]
    Body,
}

impl From<ParamLocation> for ArgumentSource {
    fn from(location: ParamLocation) -> Self {
        match location {
            ParamLocation::Path => Self::Path,
            ParamLocation::Query => Self::Query,
            ParamLocation::Header => Self::Header,
            ParamLocation::Cookie => Self::Cookie,
        }
    }
}

/// One handler argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureEntry {
    /// Parameter name, or `body`.
    pub name: String,
    /// Where the value is read from.
    pub source: ArgumentSource,
    /// Normalized type.
    #[serde(rename = "type")]
    pub descriptor: TypeDescriptor,
    /// Whether the request must supply it.
    pub required: bool,
    /// Value bound when the request omits it.
    pub default: EffectiveDefault,
}

/// Projects the arguments of an operation: parameters in declaration order,
/// then the request body (preferred media type) as `body`.
pub fn project_operation_signature(operation: &OperationModel) -> Vec<SignatureEntry> {
    let mut entries: Vec<SignatureEntry> = operation
        .parameters
        .iter()
        .map(|param| SignatureEntry {
            name: param.name.clone(),
            source: param.location.into(),
            descriptor: param.descriptor.clone(),
            required: param.required,
            default: param.default.clone(),
        })
        .collect();

    if let Some(descriptor) = operation.body.as_ref().and_then(|body| body.descriptor()) {
        let default = match &descriptor.default {
            Some(value) => EffectiveDefault::Value(value.clone()),
            None => EffectiveDefault::Absent,
        };
        entries.push(SignatureEntry {
            name: "body".into(),
            source: ArgumentSource::Body,
            descriptor: descriptor.clone(),
            required: operation.body.as_ref().is_some_and(|body| body.required),
            default,
        });
    }
    entries
}

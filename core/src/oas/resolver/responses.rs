#![deny(missing_docs)]

//! # Response Resolution
//!
//! Builds the response contracts of an operation, keyed by exact status,
//! status class or `default`, and picks the one that applies to a status.

use crate::error::{SpecError, SpecResult, ValidationError, ValidationResult};
use crate::oas::descriptor::TypeDescriptor;
use crate::oas::models::ResponseKey;
use crate::oas::normalizer::Normalizer;
use crate::oas::ref_utils::child_pointer;
use crate::oas::resolver::body::{build_content, preferred, MediaSchema, ShimMediaType};
use crate::oas::schema::SchemaOrRef;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
struct ShimResponse {
    #[serde(default)]
    content: IndexMap<String, ShimMediaType>,
    #[serde(default)]
    headers: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ShimHeader {
    #[serde(default)]
    required: bool,
    schema: Option<SchemaOrRef>,
}

/// A declared response header.
#[derive(Debug, Clone)]
pub struct HeaderSpec {
    /// Header name as declared.
    pub name: String,
    /// `required`
    pub required: bool,
    /// Normalized type. `Any` without a schema.
    pub descriptor: TypeDescriptor,
}

/// One entry of an operation's `responses`.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    /// Status, status class or `default`.
    pub key: ResponseKey,
    /// Declared media types. Empty for bodiless responses.
    pub content: Vec<MediaSchema>,
    /// Declared headers, `Content-Type` excluded.
    pub headers: Vec<HeaderSpec>,
}

impl ResponseSpec {
    /// The media type a serializer should emit.
    pub fn preferred(&self) -> Option<&MediaSchema> {
        preferred(&self.content)
    }
}

/// Builds every declared response. A missing `responses` object yields none.
pub(crate) fn build_responses<'d>(
    normalizer: &mut Normalizer<'d>,
    responses: Option<&'d Value>,
    at: &str,
) -> SpecResult<IndexMap<ResponseKey, ResponseSpec>> {
    let Some(responses) = responses else {
        return Ok(IndexMap::new());
    };
    let entries = responses
        .as_object()
        .ok_or_else(|| SpecError::InvalidDocument(format!("{at}: responses must be an object")))?;

    let mut out = IndexMap::with_capacity(entries.len());
    for (raw_key, entry) in entries {
        if raw_key.starts_with("x-") {
            continue;
        }
        let entry_at = child_pointer(at, raw_key);
        let key = ResponseKey::parse(raw_key).ok_or_else(|| SpecError::Inconsistency {
            at: entry_at.clone(),
            reason: format!("'{raw_key}' is not a status code, status range or 'default'"),
        })?;

        let (origin, target) = normalizer.resolver().resolve_object(entry)?;
        let entry_at = origin.unwrap_or(entry_at);
        let shim: ShimResponse = serde_json::from_value(target.clone())
            .map_err(|e| SpecError::InvalidDocument(format!("{entry_at}: invalid response: {e}")))?;

        let content = build_content(normalizer, &shim.content, &entry_at)?;
        let headers = build_headers(normalizer, &target["headers"], &shim.headers, &entry_at)?;
        out.insert(key, ResponseSpec { key, content, headers });
    }
    Ok(out)
}

fn build_headers<'d>(
    normalizer: &mut Normalizer<'d>,
    raw: &'d Value,
    declared: &IndexMap<String, Value>,
    at: &str,
) -> SpecResult<Vec<HeaderSpec>> {
    let mut out = Vec::with_capacity(declared.len());
    for name in declared.keys() {
        if name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        let header_at = child_pointer(&format!("{at}/headers"), name);
        let (origin, target) = normalizer.resolver().resolve_object(&raw[name.as_str()])?;
        let header_at = origin.unwrap_or(header_at);
        let shim: ShimHeader = serde_json::from_value(target.clone())
            .map_err(|e| SpecError::InvalidDocument(format!("{header_at}: invalid header: {e}")))?;
        let descriptor = match &shim.schema {
            Some(schema) => normalizer.normalize_schema(schema, &format!("{header_at}/schema"))?,
            None => TypeDescriptor::any(),
        };
        out.push(HeaderSpec {
            name: name.clone(),
            required: shim.required,
            descriptor,
        });
    }
    Ok(out)
}

/// Picks the response for `status`: exact code, then status class, then `default`.
pub fn select_response(
    responses: &IndexMap<ResponseKey, ResponseSpec>,
    status: u16,
) -> ValidationResult<&ResponseSpec> {
    let class = u8::try_from(status / 100).ok();
    responses
        .get(&ResponseKey::Status(status))
        .or_else(|| class.and_then(|c| responses.get(&ResponseKey::Range(c))))
        .or_else(|| responses.get(&ResponseKey::Default))
        .ok_or(ValidationError::UndeclaredStatus { status })
}

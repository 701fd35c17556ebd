#![deny(missing_docs)]

//! # Body Resolution
//!
//! Builds the request body contract of an operation: one normalized schema
//! per declared media type, plus the rules for choosing among them.

use crate::error::{SpecError, SpecResult, ValidationError, ValidationResult};
use crate::oas::descriptor::TypeDescriptor;
use crate::oas::models::MediaType;
use crate::oas::normalizer::Normalizer;
use crate::oas::ref_utils::child_pointer;
use crate::oas::schema::SchemaOrRef;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// A Media Type Object as declared under `content`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ShimMediaType {
    #[serde(default)]
    pub schema: Option<SchemaOrRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct ShimRequestBody {
    #[serde(default)]
    required: bool,
    #[serde(default)]
    content: IndexMap<String, ShimMediaType>,
}

/// One declared media type and its schema.
#[derive(Debug, Clone)]
pub struct MediaSchema {
    /// The declared media range.
    pub media_type: MediaType,
    /// Raw schema, walked by the composition evaluator.
    pub schema: Option<SchemaOrRef>,
    /// Normalized schema. `Any` when no schema is declared.
    pub descriptor: TypeDescriptor,
}

/// Request body contract.
#[derive(Debug, Clone)]
pub struct BodySpec {
    /// Whether a body must be sent.
    pub required: bool,
    /// Declared media types in document order.
    pub content: Vec<MediaSchema>,
}

impl BodySpec {
    /// The entry used when the caller does not name a content type.
    pub fn preferred(&self) -> Option<&MediaSchema> {
        preferred(&self.content)
    }

    /// The descriptor of the preferred entry.
    pub fn descriptor(&self) -> Option<&TypeDescriptor> {
        self.preferred().map(|media| &media.descriptor)
    }

    /// Picks the entry for a request's `Content-Type`.
    ///
    /// An exact match wins over a covering range such as `application/*`.
    pub fn select(&self, content_type: Option<&str>) -> ValidationResult<&MediaSchema> {
        let unsupported = |raw: &str| ValidationError::UnsupportedMediaType {
            content_type: raw.to_string(),
        };
        let Some(raw) = content_type else {
            return self.preferred().ok_or_else(|| unsupported(""));
        };
        let concrete = MediaType::parse(raw).ok_or_else(|| unsupported(raw))?;
        self.content
            .iter()
            .find(|media| media.media_type == concrete)
            .or_else(|| self.content.iter().find(|media| media.media_type.covers(&concrete)))
            .ok_or_else(|| unsupported(raw))
    }
}

/// Lowest preference rank, first declared on ties.
pub(crate) fn preferred(content: &[MediaSchema]) -> Option<&MediaSchema> {
    content
        .iter()
        .enumerate()
        .min_by_key(|(idx, media)| (media.media_type.preference_rank(), *idx))
        .map(|(_, media)| media)
}

/// Normalizes every entry of a `content` map.
pub(crate) fn build_content(
    normalizer: &mut Normalizer<'_>,
    content: &IndexMap<String, ShimMediaType>,
    at: &str,
) -> SpecResult<Vec<MediaSchema>> {
    let mut out = Vec::with_capacity(content.len());
    for (raw, media) in content {
        let media_at = child_pointer(&format!("{at}/content"), raw);
        let media_type = MediaType::parse(raw).ok_or_else(|| SpecError::Inconsistency {
            at: media_at.clone(),
            reason: format!("'{raw}' is not a media type"),
        })?;
        let descriptor = match &media.schema {
            Some(schema) => normalizer.normalize_schema(schema, &format!("{media_at}/schema"))?,
            None => TypeDescriptor::any(),
        };
        out.push(MediaSchema {
            media_type,
            schema: media.schema.clone(),
            descriptor,
        });
    }
    Ok(out)
}

/// Builds the request body contract from a Request Body Object (or `$ref` to one).
pub(crate) fn build_request_body<'d>(
    normalizer: &mut Normalizer<'d>,
    value: &'d Value,
    at: &str,
) -> SpecResult<BodySpec> {
    let (origin, target) = normalizer.resolver().resolve_object(value)?;
    let at = origin.unwrap_or_else(|| at.to_string());
    let shim: ShimRequestBody = serde_json::from_value(target.clone())
        .map_err(|e| SpecError::InvalidDocument(format!("{at}: invalid request body: {e}")))?;
    if shim.content.is_empty() {
        return Err(SpecError::Inconsistency {
            at,
            reason: "request body declares no content".into(),
        });
    }
    Ok(BodySpec {
        required: shim.required,
        content: build_content(normalizer, &shim.content, &at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(doc: &Value) -> SpecResult<BodySpec> {
        let mut normalizer = Normalizer::new(doc, false);
        build_request_body(&mut normalizer, &doc["body"], "#/body")
    }

    #[test]
    fn test_prefers_json() {
        let doc = json!({"body": {"content": {
            "text/plain": {"schema": {"type": "string"}},
            "application/vnd.api+json": {"schema": {"type": "object"}},
            "application/json": {"schema": {"type": "array", "items": {"type": "integer"}}}
        }}});
        let spec = body(&doc).unwrap();
        let preferred = spec.preferred().unwrap();
        assert_eq!(preferred.media_type.as_str(), "application/json");
        assert!(preferred.descriptor.is_array());
    }

    #[test]
    fn test_select_by_content_type() {
        let doc = json!({"body": {"required": true, "content": {
            "application/json": {"schema": {"type": "object"}},
            "text/*": {"schema": {"type": "string"}}
        }}});
        let spec = body(&doc).unwrap();
        assert!(spec.required);
        assert_eq!(
            spec.select(Some("text/plain; charset=utf-8")).unwrap().media_type.as_str(),
            "text/*"
        );
        assert!(matches!(
            spec.select(Some("image/png")),
            Err(ValidationError::UnsupportedMediaType { .. })
        ));
        assert_eq!(spec.select(None).unwrap().media_type.as_str(), "application/json");
    }

    #[test]
    fn test_body_ref() {
        let doc = json!({
            "components": {"requestBodies": {"Pet": {"content": {"application/json": {"schema": {"type": "object"}}}}}},
            "body": {"$ref": "#/components/requestBodies/Pet"}
        });
        let spec = body(&doc).unwrap();
        assert!(!spec.required);
        assert!(spec.descriptor().unwrap().is_object());
    }

    #[test]
    fn test_empty_content_is_inconsistent() {
        let doc = json!({"body": {"content": {}}});
        assert!(matches!(body(&doc), Err(SpecError::Inconsistency { .. })));
    }
}

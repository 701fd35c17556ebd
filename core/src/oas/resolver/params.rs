#![deny(missing_docs)]

//! # Parameter Resolution
//!
//! Builds the parameter contracts of an operation.
//!
//! - Path-level and operation-level parameters are merged. An operation-level
//!   parameter overrides the path-level one with the same `(name, in)`.
//! - `style`/`explode` defaults are applied per location, and the style is
//!   checked against both the location and the parameter's type.
//! - Each parameter carries its normalized descriptor and the effective default
//!   computed by [`reconcile`](super::defaults::reconcile).

use crate::config::EngineConfig;
use crate::error::{SpecError, SpecResult, SpecWarning};
use crate::oas::descriptor::{TypeDescriptor, TypeShape};
use crate::oas::models::{EffectiveDefault, MediaType, ParamLocation, ParamStyle};
use crate::oas::normalizer::Normalizer;
use crate::oas::resolver::body::ShimMediaType;
use crate::oas::resolver::defaults::reconcile;
use crate::oas::schema::SchemaOrRef;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Headers described by other parts of an OAS document. Parameters with these
/// names are ignored by OAS 3.0.
const RESERVED_HEADERS: [&str; 3] = ["accept", "content-type", "authorization"];

/// Parameter Object as it appears in the document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShimParameter {
    name: String,
    #[serde(rename = "in")]
    location: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    deprecated: bool,
    #[serde(default)]
    allow_empty_value: bool,
    style: Option<String>,
    explode: Option<bool>,
    schema: Option<SchemaOrRef>,
    content: Option<IndexMap<String, ShimMediaType>>,
}

/// The single media type of a `content`-encoded parameter.
#[derive(Debug, Clone)]
pub struct ContentSchema {
    /// Declared media type, usually `application/json`.
    pub media_type: MediaType,
    /// Raw schema, walked by the composition evaluator.
    pub schema: Option<SchemaOrRef>,
}

/// A fully resolved parameter contract.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    /// Parameter name, case preserved.
    pub name: String,
    /// Where the parameter is carried.
    pub location: ParamLocation,
    /// Whether the request must supply it. Always true for path parameters.
    pub required: bool,
    /// `deprecated`
    pub deprecated: bool,
    /// An empty query value counts as absent. Query parameters only.
    pub allow_empty_value: bool,
    /// Serialization style after defaults.
    pub style: ParamStyle,
    /// `explode` after defaults.
    pub explode: bool,
    /// Set when the parameter is declared through `content` instead of `schema`.
    pub content: Option<ContentSchema>,
    /// Normalized type.
    pub descriptor: TypeDescriptor,
    /// Value bound when the request omits the parameter.
    pub default: EffectiveDefault,
}

impl ParameterSpec {
    /// Whether `name` refers to this parameter. Header names compare case-insensitively.
    pub fn is_named(&self, name: &str) -> bool {
        match self.location {
            ParamLocation::Header => self.name.eq_ignore_ascii_case(name),
            _ => self.name == name,
        }
    }
}

fn inconsistent(at: &str, reason: impl Into<String>) -> SpecError {
    SpecError::Inconsistency {
        at: at.to_string(),
        reason: reason.into(),
    }
}

/// Path-level parameters of one path item, built once and shared by every
/// operation of the item.
///
/// Their reconcile warnings are held back until [`finish`](Self::finish) and
/// only recorded for parameters at least one operation inherited.
#[derive(Debug, Default)]
pub(crate) struct PathParameters {
    entries: Vec<(ParameterSpec, Option<SpecWarning>)>,
    inherited: Vec<bool>,
}

impl PathParameters {
    /// Builds the `parameters` array of the path item at `path_at`.
    pub(crate) fn build<'d>(
        normalizer: &mut Normalizer<'d>,
        config: &EngineConfig,
        list: Option<&'d Value>,
        path_at: &str,
    ) -> SpecResult<Self> {
        let entries = collect_level(normalizer, config, list, &format!("{path_at}/parameters"))?;
        let inherited = vec![false; entries.len()];
        Ok(Self { entries, inherited })
    }

    /// Records the held-back warnings, once per inherited parameter.
    pub(crate) fn finish(self, normalizer: &mut Normalizer<'_>) -> SpecResult<()> {
        for ((_, warning), inherited) in self.entries.into_iter().zip(self.inherited) {
            if let (Some(warning), true) = (warning, inherited) {
                normalizer.warn(&warning.at, warning.kind)?;
            }
        }
        Ok(())
    }
}

/// Resolves the operation-level `parameters` at `op_at` and merges them with
/// the path-level ones. Path-level parameters come first.
pub(crate) fn build_parameters<'d>(
    normalizer: &mut Normalizer<'d>,
    config: &EngineConfig,
    path_level: &mut PathParameters,
    op_level: Option<&'d Value>,
    op_at: &str,
) -> SpecResult<Vec<ParameterSpec>> {
    let mut own = Vec::new();
    for (spec, warning) in collect_level(normalizer, config, op_level, &format!("{op_at}/parameters"))? {
        if let Some(warning) = warning {
            normalizer.warn(&warning.at, warning.kind)?;
        }
        own.push(spec);
    }

    let mut merged = Vec::with_capacity(path_level.entries.len() + own.len());
    for ((base, _), inherited) in path_level.entries.iter().zip(path_level.inherited.iter_mut()) {
        if own
            .iter()
            .any(|p| p.location == base.location && p.is_named(&base.name))
        {
            continue;
        }
        *inherited = true;
        merged.push(base.clone());
    }
    merged.extend(own);

    // Bound values are keyed by name alone.
    for (idx, param) in merged.iter().enumerate() {
        if let Some(twin) = merged[..idx].iter().find(|p| p.name == param.name) {
            return Err(inconsistent(
                op_at,
                format!(
                    "parameter '{}' is declared in both {} and {}",
                    param.name, twin.location, param.location
                ),
            ));
        }
    }
    Ok(merged)
}

fn collect_level<'d>(
    normalizer: &mut Normalizer<'d>,
    config: &EngineConfig,
    list: Option<&'d Value>,
    at: &str,
) -> SpecResult<Vec<(ParameterSpec, Option<SpecWarning>)>> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    let items = list
        .as_array()
        .ok_or_else(|| SpecError::InvalidDocument(format!("{at}: parameters must be an array")))?;

    let mut out: Vec<(ParameterSpec, Option<SpecWarning>)> = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let item_at = format!("{at}/{idx}");
        let (origin, target) = normalizer.resolver().resolve_object(item)?;
        let param_at = origin.unwrap_or(item_at);
        let shim: ShimParameter = serde_json::from_value(target.clone()).map_err(|e| {
            SpecError::InvalidDocument(format!("{param_at}: invalid parameter: {e}"))
        })?;

        if shim.location == "header"
            && RESERVED_HEADERS.contains(&shim.name.to_ascii_lowercase().as_str())
        {
            if config.ignore_reserved_headers {
                warn!(at = %param_at, header = %shim.name, "ignoring reserved header parameter");
                continue;
            }
            return Err(inconsistent(
                &param_at,
                format!("header parameter '{}' is reserved", shim.name),
            ));
        }

        let (spec, warning) = build_parameter(normalizer, shim, &param_at)?;
        if out
            .iter()
            .any(|(p, _)| p.location == spec.location && p.is_named(&spec.name))
        {
            return Err(inconsistent(
                &param_at,
                format!("duplicate {} parameter '{}'", spec.location, spec.name),
            ));
        }
        out.push((spec, warning));
    }
    Ok(out)
}

fn build_parameter(
    normalizer: &mut Normalizer<'_>,
    shim: ShimParameter,
    at: &str,
) -> SpecResult<(ParameterSpec, Option<SpecWarning>)> {
    let location = ParamLocation::parse(&shim.location)
        .ok_or_else(|| inconsistent(at, format!("unknown parameter location '{}'", shim.location)))?;
    if location == ParamLocation::Path && !shim.required {
        return Err(inconsistent(
            at,
            format!("path parameter '{}' must be required", shim.name),
        ));
    }

    let (descriptor, content) = match (&shim.schema, &shim.content) {
        (Some(schema), None) => (normalizer.normalize_schema(schema, &format!("{at}/schema"))?, None),
        (None, Some(content)) => {
            if content.len() != 1 {
                return Err(inconsistent(at, "content must declare exactly one media type"));
            }
            if shim.style.is_some() || shim.explode.is_some() {
                return Err(inconsistent(at, "content parameters cannot declare style or explode"));
            }
            let Some((raw, media)) = content.first() else {
                return Err(inconsistent(at, "content must declare exactly one media type"));
            };
            let media_type = MediaType::parse(raw)
                .ok_or_else(|| inconsistent(at, format!("'{raw}' is not a media type")))?;
            let descriptor = match &media.schema {
                Some(schema) => normalizer.normalize_schema(schema, &format!("{at}/content/schema"))?,
                None => TypeDescriptor::any(),
            };
            let content = ContentSchema {
                media_type,
                schema: media.schema.clone(),
            };
            (descriptor, Some(content))
        }
        (Some(_), Some(_)) => return Err(inconsistent(at, "schema and content are mutually exclusive")),
        (None, None) => return Err(inconsistent(at, "parameter declares neither schema nor content")),
    };

    let style = match &shim.style {
        Some(raw) => ParamStyle::parse(raw)
            .ok_or_else(|| inconsistent(at, format!("unknown style '{raw}'")))?,
        None => location.default_style(),
    };
    if !location.allowed_styles().contains(&style) {
        return Err(inconsistent(
            at,
            format!("style '{style}' is not allowed for {location} parameters"),
        ));
    }
    check_style_shape(style, &descriptor, at)?;
    let explode = shim.explode.unwrap_or_else(|| style.default_explode());

    let (default, warning) = reconcile(&shim.name, shim.required, &descriptor);
    let warning = warning.map(|kind| SpecWarning {
        at: at.to_string(),
        kind,
    });

    let spec = ParameterSpec {
        name: shim.name,
        location,
        required: shim.required,
        deprecated: shim.deprecated,
        allow_empty_value: location == ParamLocation::Query && shim.allow_empty_value,
        style,
        explode,
        content,
        descriptor,
        default,
    };
    Ok((spec, warning))
}

fn check_style_shape(style: ParamStyle, descriptor: &TypeDescriptor, at: &str) -> SpecResult<()> {
    let fits = match style {
        ParamStyle::SpaceDelimited | ParamStyle::PipeDelimited => {
            matches!(descriptor.shape, TypeShape::Array { .. } | TypeShape::Any)
        }
        ParamStyle::DeepObject => matches!(descriptor.shape, TypeShape::Object { .. } | TypeShape::Any),
        _ => true,
    };
    if fits {
        Ok(())
    } else {
        Err(inconsistent(
            at,
            format!("style '{style}' cannot serialize {descriptor}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;
    use serde_json::json;

    fn build(doc: &Value, config: &EngineConfig) -> SpecResult<Vec<ParameterSpec>> {
        let mut normalizer = Normalizer::new(doc, config.strict);
        let mut inherited =
            PathParameters::build(&mut normalizer, config, doc.get("pathParams"), "#/paths/~1pets")?;
        let params = build_parameters(
            &mut normalizer,
            config,
            &mut inherited,
            doc.get("opParams"),
            "#/paths/~1pets/get",
        )?;
        inherited.finish(&mut normalizer)?;
        Ok(params)
    }

    fn build_one(param: Value) -> SpecResult<ParameterSpec> {
        let doc = json!({"opParams": [param]});
        build(&doc, &EngineConfig::default()).map(|mut v| v.remove(0))
    }

    #[test]
    fn test_defaults_per_location() {
        let query = build_one(json!({"name": "tags", "in": "query", "schema": {"type": "array", "items": {"type": "string"}}})).unwrap();
        assert_eq!(query.style, ParamStyle::Form);
        assert!(query.explode);

        let path = build_one(json!({"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}})).unwrap();
        assert_eq!(path.style, ParamStyle::Simple);
        assert!(!path.explode);
        assert_eq!(path.descriptor, TypeDescriptor::integer());
    }

    #[test]
    fn test_path_must_be_required() {
        let err = build_one(json!({"name": "id", "in": "path", "schema": {"type": "integer"}})).unwrap_err();
        assert!(matches!(err, SpecError::Inconsistency { .. }));
    }

    #[test]
    fn test_style_not_allowed_for_location() {
        let err = build_one(json!({"name": "id", "in": "header", "style": "form", "schema": {"type": "string"}})).unwrap_err();
        assert!(matches!(err, SpecError::Inconsistency { .. }));
    }

    #[test]
    fn test_pipe_delimited_needs_array() {
        let err = build_one(json!({"name": "q", "in": "query", "style": "pipeDelimited", "schema": {"type": "string"}})).unwrap_err();
        assert!(matches!(err, SpecError::Inconsistency { .. }));
        let ok = build_one(json!({"name": "q", "in": "query", "style": "pipeDelimited", "schema": {"type": "array", "items": {"type": "string"}}})).unwrap();
        assert!(!ok.explode);
    }

    #[test]
    fn test_schema_xor_content() {
        let both = build_one(json!({"name": "f", "in": "query", "schema": {"type": "string"},
            "content": {"application/json": {"schema": {"type": "object"}}}}));
        assert!(both.is_err());
        let neither = build_one(json!({"name": "f", "in": "query"}));
        assert!(neither.is_err());
    }

    #[test]
    fn test_content_parameter() {
        let spec = build_one(json!({"name": "filter", "in": "query",
            "content": {"application/json": {"schema": {"type": "object", "properties": {"a": {"type": "integer"}}}}}}))
        .unwrap();
        let content = spec.content.unwrap();
        assert!(content.media_type.is_json());
        assert!(spec.descriptor.is_object());
    }

    #[test]
    fn test_operation_level_overrides_path_level() {
        let doc = json!({
            "pathParams": [
                {"name": "limit", "in": "query", "schema": {"type": "string"}},
                {"name": "trace", "in": "header", "schema": {"type": "string"}}
            ],
            "opParams": [{"name": "limit", "in": "query", "schema": {"type": "integer"}}]
        });
        let params = build(&doc, &EngineConfig::default()).unwrap();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["trace", "limit"]);
        assert_eq!(params[1].descriptor, TypeDescriptor::integer());
    }

    #[test]
    fn test_same_name_in_two_locations() {
        let doc = json!({
            "pathParams": [{"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}],
            "opParams": [{"name": "id", "in": "query", "schema": {"type": "string"}}]
        });
        match build(&doc, &EngineConfig::default()) {
            Err(SpecError::Inconsistency { at, reason }) => {
                assert_eq!(at, "#/paths/~1pets/get");
                assert_eq!(reason, "parameter 'id' is declared in both path and query");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_in_one_level() {
        let doc = json!({"opParams": [
            {"name": "X-Id", "in": "header", "schema": {"type": "string"}},
            {"name": "x-id", "in": "header", "schema": {"type": "string"}}
        ]});
        assert!(matches!(
            build(&doc, &EngineConfig::default()),
            Err(SpecError::Inconsistency { .. })
        ));
    }

    #[test]
    fn test_reserved_headers() {
        let doc = json!({"opParams": [{"name": "Accept", "in": "header", "schema": {"type": "string"}}]});
        assert!(build(&doc, &EngineConfig::default()).unwrap().is_empty());

        let config = EngineConfig {
            ignore_reserved_headers: false,
            ..EngineConfig::default()
        };
        assert!(build(&doc, &config).is_err());
    }

    #[test]
    fn test_parameter_ref() {
        let doc = json!({
            "components": {"parameters": {"Limit": {"name": "limit", "in": "query",
                "schema": {"type": "integer", "nullable": true}}}},
            "opParams": [{"$ref": "#/components/parameters/Limit"}]
        });
        let params = build(&doc, &EngineConfig::default()).unwrap();
        assert_eq!(params[0].name, "limit");
        assert_eq!(params[0].default, EffectiveDefault::Null);
    }

    #[test]
    fn test_required_default_warning() {
        let doc = json!({"opParams": [{"name": "page", "in": "query", "required": true,
            "schema": {"type": "integer", "default": 1}}]});
        let mut normalizer = Normalizer::new(&doc, false);
        let params = build_parameters(
            &mut normalizer,
            &EngineConfig::default(),
            &mut PathParameters::default(),
            doc.get("opParams"),
            "#/op",
        )
        .unwrap();
        assert_eq!(params[0].default, EffectiveDefault::Value(json!(1)));
        let (_, warnings) = normalizer.finish();
        assert_eq!(
            warnings,
            vec![SpecWarning {
                at: "#/op/parameters/0".into(),
                kind: WarningKind::UnobservableDefault {
                    parameter: "page".into()
                },
            }]
        );

        let strict = EngineConfig::strict();
        assert!(build(&doc, &strict).is_err());
    }

    #[test]
    fn test_path_level_warning_recorded_once() {
        let doc = json!({
            "pathParams": [{"name": "page", "in": "query", "required": true,
                "schema": {"type": "integer", "default": 1}}],
            "getParams": [],
            "putParams": [{"name": "other", "in": "query", "schema": {"type": "string"}}]
        });
        let config = EngineConfig::default();
        let mut normalizer = Normalizer::new(&doc, false);
        let mut inherited =
            PathParameters::build(&mut normalizer, &config, doc.get("pathParams"), "#/p").unwrap();
        for (key, at) in [("getParams", "#/p/get"), ("putParams", "#/p/put"), ("getParams", "#/p/post")] {
            let params = build_parameters(&mut normalizer, &config, &mut inherited, doc.get(key), at).unwrap();
            assert_eq!(params[0].name, "page");
        }
        inherited.finish(&mut normalizer).unwrap();
        let (_, warnings) = normalizer.finish();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].at, "#/p/parameters/0");
    }

    #[test]
    fn test_overridden_path_level_does_not_warn() {
        let doc = json!({
            "pathParams": [{"name": "page", "in": "query", "required": true,
                "schema": {"type": "integer", "default": 1}}],
            "opParams": [{"name": "page", "in": "query", "schema": {"type": "integer"}}]
        });
        let mut normalizer = Normalizer::new(&doc, false);
        let config = EngineConfig::default();
        let mut inherited =
            PathParameters::build(&mut normalizer, &config, doc.get("pathParams"), "#/p").unwrap();
        build_parameters(&mut normalizer, &config, &mut inherited, doc.get("opParams"), "#/p/get").unwrap();
        inherited.finish(&mut normalizer).unwrap();
        let (_, warnings) = normalizer.finish();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_allow_empty_value_only_for_query() {
        let spec = build_one(json!({"name": "h", "in": "header", "allowEmptyValue": true, "schema": {"type": "string"}})).unwrap();
        assert!(!spec.allow_empty_value);
        let spec = build_one(json!({"name": "q", "in": "query", "allowEmptyValue": true, "schema": {"type": "string"}})).unwrap();
        assert!(spec.allow_empty_value);
    }
}

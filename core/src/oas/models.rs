#![deny(missing_docs)]

//! # OpenAPI Models
//!
//! Small vocabulary types shared by the load-time model builders and the
//! request-time runtime: parameter locations and styles, HTTP methods,
//! media types, response keys and effective defaults.

use derive_more::Display;
use serde::Serialize;
use serde_json::Value;

/// Where a parameter is carried in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// URL path segment, e.g. `/pets/{id}`.
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
}

impl ParamLocation {
    /// Parses the value of a parameter's `in` field.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    /// Style used when the parameter does not declare one.
    pub fn default_style(self) -> ParamStyle {
        match self {
            Self::Query | Self::Cookie => ParamStyle::Form,
            Self::Path | Self::Header => ParamStyle::Simple,
        }
    }

    /// Styles this location may declare.
    pub fn allowed_styles(self) -> &'static [ParamStyle] {
        match self {
            Self::Path => &[ParamStyle::Simple, ParamStyle::Label, ParamStyle::Matrix],
            Self::Query => &[
                ParamStyle::Form,
                ParamStyle::SpaceDelimited,
                ParamStyle::PipeDelimited,
                ParamStyle::DeepObject,
            ],
            Self::Header => &[ParamStyle::Simple],
            Self::Cookie => &[ParamStyle::Form],
        }
    }
}

/// Parameter serialization style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamStyle {
    /// `matrix`
    #[display("matrix")]
    Matrix,
    /// `label`
    #[display("label")]
    Label,
    /// `form`
    #[display("form")]
    Form,
    /// `simple`
    #[display("simple")]
    Simple,
    /// `spaceDelimited`
    #[display("spaceDelimited")]
    SpaceDelimited,
    /// `pipeDelimited`
    #[display("pipeDelimited")]
    PipeDelimited,
    /// `deepObject`
    #[display("deepObject")]
    DeepObject,
}

impl ParamStyle {
    /// Parses the value of a parameter's `style` field.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "matrix" => Some(Self::Matrix),
            "label" => Some(Self::Label),
            "form" => Some(Self::Form),
            "simple" => Some(Self::Simple),
            "spaceDelimited" => Some(Self::SpaceDelimited),
            "pipeDelimited" => Some(Self::PipeDelimited),
            "deepObject" => Some(Self::DeepObject),
            _ => None,
        }
    }

    /// `explode` when the parameter does not declare it: true only for `form`.
    pub fn default_explode(self) -> bool {
        matches!(self, Self::Form)
    }
}

/// HTTP methods an OAS path item may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    #[display("GET")]
    Get,
    /// PUT
    #[display("PUT")]
    Put,
    /// POST
    #[display("POST")]
    Post,
    /// DELETE
    #[display("DELETE")]
    Delete,
    /// OPTIONS
    #[display("OPTIONS")]
    Options,
    /// HEAD
    #[display("HEAD")]
    Head,
    /// PATCH
    #[display("PATCH")]
    Patch,
    /// TRACE
    #[display("TRACE")]
    Trace,
}

impl HttpMethod {
    /// All methods, in the order they are read from a path item.
    pub const ALL: [HttpMethod; 8] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Patch,
        Self::Trace,
    ];

    /// The lowercase key used in a path item.
    pub fn key(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Delete => "delete",
            Self::Options => "options",
            Self::Head => "head",
            Self::Patch => "patch",
            Self::Trace => "trace",
        }
    }
}

/// A `type/subtype` media type with parameters stripped and case folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize)]
#[display("{essence}")]
#[serde(transparent)]
pub struct MediaType {
    essence: String,
}

impl MediaType {
    /// Parses a media range such as `application/json; charset=utf-8`.
    pub fn parse(raw: &str) -> Option<Self> {
        let essence = raw.split(';').next()?.trim().to_ascii_lowercase();
        let (ty, subtype) = essence.split_once('/')?;
        if ty.is_empty() || subtype.is_empty() || subtype.contains('/') {
            return None;
        }
        Some(Self { essence })
    }

    /// `type/subtype`.
    pub fn as_str(&self) -> &str {
        &self.essence
    }

    fn parts(&self) -> (&str, &str) {
        self.essence
            .split_once('/')
            .unwrap_or((self.essence.as_str(), ""))
    }

    /// `application/json` or any `+json` structured syntax suffix.
    pub fn is_json(&self) -> bool {
        let (ty, subtype) = self.parts();
        (ty == "application" && subtype == "json") || subtype.ends_with("+json")
    }

    /// Whether a declared media range covers a concrete media type.
    pub fn covers(&self, concrete: &MediaType) -> bool {
        let (ty, subtype) = self.parts();
        let (c_ty, _) = concrete.parts();
        match (ty, subtype) {
            ("*", "*") => true,
            (ty, "*") => ty == c_ty,
            _ => self.essence == concrete.essence,
        }
    }

    /// Lower ranks are preferred when no content type picks an entry.
    ///
    /// 1. `application/json`
    /// 2. Any `+json` media type
    /// 3. `application/*`
    /// 4. `*/*`
    /// 5. Everything else
    pub fn preference_rank(&self) -> u8 {
        match self.essence.as_str() {
            "application/json" => 0,
            s if s.ends_with("+json") => 1,
            "application/*" => 2,
            "*/*" => 3,
            _ => 4,
        }
    }
}

/// Key of a response entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum ResponseKey {
    /// An exact status code such as `200`.
    #[display("{_0}")]
    Status(u16),
    /// A status class such as `2XX`, holding the leading digit.
    #[display("{_0}XX")]
    Range(u8),
    /// `default`
    #[display("default")]
    Default,
}

impl ResponseKey {
    /// Parses a key of an operation's `responses` map.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "default" {
            return Some(Self::Default);
        }
        let bytes = raw.as_bytes();
        if bytes.len() != 3 || !(b'1'..=b'5').contains(&bytes[0]) {
            return None;
        }
        if raw[1..].eq_ignore_ascii_case("xx") {
            return Some(Self::Range(bytes[0] - b'0'));
        }
        raw.parse().ok().map(Self::Status)
    }
}

/// The value a parameter takes when the request omits it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EffectiveDefault {
    /// The declared `default`.
    Value(Value),
    /// JSON null, for nullable parameters without a default.
    Null,
    /// Omitted entirely from the bound parameters.
    Absent,
}

impl EffectiveDefault {
    /// The value to bind, or `None` when the parameter stays absent.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v.clone()),
            Self::Null => Some(Value::Null),
            Self::Absent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_defaults() {
        assert_eq!(ParamLocation::Query.default_style(), ParamStyle::Form);
        assert_eq!(ParamLocation::Cookie.default_style(), ParamStyle::Form);
        assert_eq!(ParamLocation::Path.default_style(), ParamStyle::Simple);
        assert_eq!(ParamLocation::Header.default_style(), ParamStyle::Simple);
        assert!(ParamStyle::Form.default_explode());
        assert!(!ParamStyle::Simple.default_explode());
    }

    #[test]
    fn test_media_type_parse_and_json() {
        let mt = MediaType::parse("Application/JSON; charset=utf-8").unwrap();
        assert_eq!(mt.as_str(), "application/json");
        assert!(mt.is_json());
        assert!(MediaType::parse("application/problem+json").unwrap().is_json());
        assert!(!MediaType::parse("text/plain").unwrap().is_json());
        assert!(MediaType::parse("json").is_none());
    }

    #[test]
    fn test_media_type_covers() {
        let any = MediaType::parse("*/*").unwrap();
        let app = MediaType::parse("application/*").unwrap();
        let json = MediaType::parse("application/json").unwrap();
        let text = MediaType::parse("text/plain").unwrap();
        assert!(any.covers(&text));
        assert!(app.covers(&json));
        assert!(!app.covers(&text));
        assert!(json.covers(&json));
        assert!(!json.covers(&text));
    }

    #[test]
    fn test_response_key_parse() {
        assert_eq!(ResponseKey::parse("200"), Some(ResponseKey::Status(200)));
        assert_eq!(ResponseKey::parse("4xx"), Some(ResponseKey::Range(4)));
        assert_eq!(ResponseKey::parse("default"), Some(ResponseKey::Default));
        assert_eq!(ResponseKey::parse("600"), None);
        assert_eq!(ResponseKey::parse("ok"), None);
        assert_eq!(ResponseKey::Range(2).to_string(), "2XX");
    }

    #[test]
    fn test_effective_default_values() {
        assert_eq!(EffectiveDefault::Null.to_value(), Some(Value::Null));
        assert_eq!(EffectiveDefault::Absent.to_value(), None);
    }
}

#![deny(missing_docs)]

//! # Schema Nodes
//!
//! The raw OAS 3.0 Schema Object as it appears in the document, before any
//! `$ref` is followed. Parsed once with `serde` and immutable afterwards;
//! nested schemas are shared behind `Arc` so that resolved references can be
//! compared by identity.

use indexmap::IndexMap;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The OAS 3.0 `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// `string`
    #[display("string")]
    String,
    /// `number`
    #[display("number")]
    Number,
    /// `integer`
    #[display("integer")]
    Integer,
    /// `boolean`
    #[display("boolean")]
    Boolean,
    /// `array`
    #[display("array")]
    Array,
    /// `object`
    #[display("object")]
    Object,
}

/// A compiled `pattern` keyword. Compared by source text.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compiles a pattern.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    /// The source text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Unanchored search, as JSON Schema specifies.
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source)
            .map_err(|e| de::Error::custom(format!("invalid pattern {source:?}: {e}")))
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A `$ref` pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{pointer}")]
pub struct Reference {
    /// The raw `$ref` value.
    pub pointer: String,
}

/// A schema position: either an inline node or a reference to one.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOrRef {
    /// `{"$ref": "..."}`. Sibling keywords are ignored, as in OAS 3.0.
    Ref(Reference),
    /// An inline schema.
    Inline(Arc<SchemaNode>),
}

impl SchemaOrRef {
    /// Parses a schema position from an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if let Some(reference) = value.get("$ref") {
            return match reference {
                Value::String(pointer) => Ok(Self::Ref(Reference {
                    pointer: pointer.clone(),
                })),
                _ => Err(de::Error::custom("`$ref` must be a string")),
            };
        }
        serde_json::from_value::<SchemaNode>(value).map(|node| Self::Inline(Arc::new(node)))
    }

    /// Wraps an owned node.
    pub fn inline(node: SchemaNode) -> Self {
        Self::Inline(Arc::new(node))
    }
}

impl<'de> Deserialize<'de> for SchemaOrRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SchemaOrRef::from_value(value).map_err(de::Error::custom)
    }
}

/// The `additionalProperties` keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalSchema {
    /// `true` or `false`.
    Allowed(bool),
    /// A schema every undeclared property must satisfy.
    Schema(SchemaOrRef),
}

impl<'de> Deserialize<'de> for AdditionalSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(allowed) => Ok(Self::Allowed(allowed)),
            other => SchemaOrRef::from_value(other)
                .map(Self::Schema)
                .map_err(de::Error::custom),
        }
    }
}

// Keeps an explicit `default: null` distinguishable from a missing `default`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// An OAS 3.0 Schema Object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaNode {
    /// `type`
    #[serde(rename = "type")]
    pub schema_type: Option<SchemaType>,
    /// `format`
    pub format: Option<String>,
    /// `nullable`
    pub nullable: bool,
    /// `enum`
    #[serde(rename = "enum")]
    pub enumeration: Option<Vec<Value>>,
    /// `items`
    pub items: Option<SchemaOrRef>,
    /// `properties`, in declaration order.
    pub properties: IndexMap<String, SchemaOrRef>,
    /// `required`
    pub required: Vec<String>,
    /// `additionalProperties`
    pub additional_properties: Option<AdditionalSchema>,
    /// `oneOf`
    pub one_of: Vec<SchemaOrRef>,
    /// `anyOf`
    pub any_of: Vec<SchemaOrRef>,
    /// `allOf`
    pub all_of: Vec<SchemaOrRef>,
    /// `not`
    pub not: Option<SchemaOrRef>,
    /// `readOnly`
    pub read_only: bool,
    /// `writeOnly`
    pub write_only: bool,
    /// `deprecated`
    pub deprecated: bool,
    /// `default`; `Some(Value::Null)` when declared as null.
    #[serde(deserialize_with = "present")]
    pub default: Option<Value>,
    /// `minLength`
    pub min_length: Option<u64>,
    /// `maxLength`
    pub max_length: Option<u64>,
    /// `pattern`
    pub pattern: Option<Pattern>,
    /// `minimum`
    pub minimum: Option<f64>,
    /// `maximum`
    pub maximum: Option<f64>,
    /// `exclusiveMinimum` (boolean form)
    pub exclusive_minimum: bool,
    /// `exclusiveMaximum` (boolean form)
    pub exclusive_maximum: bool,
    /// `multipleOf`
    pub multiple_of: Option<f64>,
    /// `minItems`
    pub min_items: Option<u64>,
    /// `maxItems`
    pub max_items: Option<u64>,
    /// `uniqueItems`
    pub unique_items: bool,
}

impl SchemaNode {
    /// Parses a node from a decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Whether any of `oneOf`, `anyOf`, `allOf` or `not` is present.
    pub fn has_composition(&self) -> bool {
        !self.one_of.is_empty()
            || !self.any_of.is_empty()
            || !self.all_of.is_empty()
            || self.not.is_some()
    }

    /// A node whose only typing keyword is `not`. Such a member excludes values
    /// at validation time but contributes no type of its own.
    pub fn is_exclusion_only(&self) -> bool {
        self.not.is_some()
            && self.schema_type.is_none()
            && self.one_of.is_empty()
            && self.any_of.is_empty()
            && self.all_of.is_empty()
            && self.items.is_none()
            && self.properties.is_empty()
            && self.enumeration.is_none()
    }

    /// Every nested schema position, with the pointer segment leading to it.
    pub fn children(&self) -> Vec<(String, &SchemaOrRef)> {
        let mut out = Vec::new();
        if let Some(items) = &self.items {
            out.push(("items".to_string(), items));
        }
        for (name, prop) in &self.properties {
            out.push((format!("properties/{name}"), prop));
        }
        if let Some(AdditionalSchema::Schema(extra)) = &self.additional_properties {
            out.push(("additionalProperties".to_string(), extra));
        }
        for (keyword, members) in [
            ("oneOf", &self.one_of),
            ("anyOf", &self.any_of),
            ("allOf", &self.all_of),
        ] {
            for (idx, member) in members.iter().enumerate() {
                out.push((format!("{keyword}/{idx}"), member));
            }
        }
        if let Some(not) = &self.not {
            out.push(("not".to_string(), not));
        }
        out
    }
}

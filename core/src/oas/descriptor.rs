#![deny(missing_docs)]

//! # Type Descriptors
//!
//! The composition-free semantic type of a schema: one closed tagged variant
//! per shape plus orthogonal flags (`nullable`, read/write annotations),
//! value constraints and the declared default.
//!
//! Descriptors are built once at load time by the normalizer and are what
//! handlers and static analysis consume. [`TypeDescriptor::as_node`] goes back
//! the other way, producing a schema node that normalizes to an equal
//! descriptor.

use crate::error::{ValidationError, ValidationResult};
use crate::oas::schema::{AdditionalSchema, Pattern, SchemaNode, SchemaOrRef, SchemaType};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Scalar kinds. `integer` and `number` stay distinct; formats are hints only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
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
}

impl From<PrimitiveKind> for SchemaType {
    fn from(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::String => SchemaType::String,
            PrimitiveKind::Number => SchemaType::Number,
            PrimitiveKind::Integer => SchemaType::Integer,
            PrimitiveKind::Boolean => SchemaType::Boolean,
        }
    }
}

/// Coarse tag used to decide whether union members can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindTag {
    /// A primitive of the given kind.
    Primitive(PrimitiveKind),
    /// Any array.
    Array,
    /// Any object.
    Object,
}

/// Read/write annotations. They never change the structural shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    /// Response-only.
    pub read_only: bool,
    /// Request-only.
    pub write_only: bool,
    /// Marked `deprecated`.
    pub deprecated: bool,
}

impl Annotations {
    /// Reads the annotation keywords of a node.
    pub fn from_node(node: &SchemaNode) -> Self {
        Self {
            read_only: node.read_only,
            write_only: node.write_only,
            deprecated: node.deprecated,
        }
    }

    /// Ors another set of annotations into this one.
    pub fn fold(&mut self, other: Annotations) {
        self.read_only |= other.read_only;
        self.write_only |= other.write_only;
        self.deprecated |= other.deprecated;
    }

    /// No annotation set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Value constraints carried through normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    /// `enum`
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    /// `minLength`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    /// `maxLength`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    /// `pattern`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    /// `minimum`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// `maximum`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// `exclusiveMinimum`
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_minimum: bool,
    /// `exclusiveMaximum`
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_maximum: bool,
    /// `multipleOf`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    /// `minItems`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    /// `maxItems`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
}

impl Constraints {
    /// Copies the constraint keywords of a node.
    pub fn from_node(node: &SchemaNode) -> Self {
        Self {
            enumeration: node.enumeration.clone(),
            min_length: node.min_length,
            max_length: node.max_length,
            pattern: node.pattern.clone(),
            minimum: node.minimum,
            maximum: node.maximum,
            exclusive_minimum: node.exclusive_minimum,
            exclusive_maximum: node.exclusive_maximum,
            multiple_of: node.multiple_of,
            min_items: node.min_items,
            max_items: node.max_items,
        }
    }

    fn apply_to(&self, node: &mut SchemaNode) {
        node.enumeration = self.enumeration.clone();
        node.min_length = self.min_length;
        node.max_length = self.max_length;
        node.pattern = self.pattern.clone();
        node.minimum = self.minimum;
        node.maximum = self.maximum;
        node.exclusive_minimum = self.exclusive_minimum;
        node.exclusive_maximum = self.exclusive_maximum;
        node.multiple_of = self.multiple_of;
        node.min_items = self.min_items;
        node.max_items = self.max_items;
    }

    /// Fills every unset keyword from `other`.
    pub fn fill_from(&mut self, other: &Constraints) {
        if self.enumeration.is_none() {
            self.enumeration = other.enumeration.clone();
        }
        if self.pattern.is_none() {
            self.pattern = other.pattern.clone();
        }
        self.min_length = self.min_length.or(other.min_length);
        self.max_length = self.max_length.or(other.max_length);
        if self.minimum.is_none() {
            self.minimum = other.minimum;
            self.exclusive_minimum = other.exclusive_minimum;
        }
        if self.maximum.is_none() {
            self.maximum = other.maximum;
            self.exclusive_maximum = other.exclusive_maximum;
        }
        self.multiple_of = self.multiple_of.or(other.multiple_of);
        self.min_items = self.min_items.or(other.min_items);
        self.max_items = self.max_items.or(other.max_items);
    }

    /// No keyword set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Open-endedness of an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Additional {
    /// Undeclared properties are accepted untyped.
    Open,
    /// `additionalProperties: false`.
    Closed,
    /// Undeclared properties must match a schema.
    Typed(Box<TypeDescriptor>),
}

/// The structural variant of a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum TypeShape {
    /// A scalar.
    Primitive {
        /// Semantic kind.
        #[serde(rename = "type")]
        kind: PrimitiveKind,
        /// Serialization hint such as `int64` or `date-time`.
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    /// A homogeneous list.
    Array {
        /// Item type.
        element: Box<TypeDescriptor>,
        /// `uniqueItems`
        unique: bool,
    },
    /// A record.
    Object {
        /// Declared properties in declaration order.
        properties: IndexMap<String, TypeDescriptor>,
        /// Names listed in `required`.
        required: BTreeSet<String>,
        /// Treatment of undeclared properties.
        additional: Additional,
    },
    /// Alternatives, in first-occurrence order. Always two or more distinct members.
    Union {
        /// Members.
        members: Vec<TypeDescriptor>,
        /// Every member pair differs in kind, so a raw token maps back unambiguously.
        distinguishable: bool,
    },
    /// No typing information.
    Any,
}

/// A normalized semantic type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDescriptor {
    /// Structural variant.
    #[serde(flatten)]
    pub shape: TypeShape,
    /// Null is accepted in addition to the shape.
    pub nullable: bool,
    /// readOnly / writeOnly / deprecated.
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
    /// Value constraints.
    #[serde(skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    /// Declared `default`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl TypeDescriptor {
    /// A descriptor with no flags, constraints or default.
    pub fn new(shape: TypeShape) -> Self {
        Self {
            shape,
            nullable: false,
            annotations: Annotations::default(),
            constraints: Constraints::default(),
            default: None,
        }
    }

    /// A primitive descriptor.
    pub fn primitive(kind: PrimitiveKind, format: Option<&str>) -> Self {
        Self::new(TypeShape::Primitive {
            kind,
            format: format.map(str::to_string),
        })
    }

    /// `integer` without format.
    pub fn integer() -> Self {
        Self::primitive(PrimitiveKind::Integer, None)
    }

    /// `string` without format.
    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String, None)
    }

    /// `boolean`.
    pub fn boolean() -> Self {
        Self::primitive(PrimitiveKind::Boolean, None)
    }

    /// `number` without format.
    pub fn number() -> Self {
        Self::primitive(PrimitiveKind::Number, None)
    }

    /// An array of `element`.
    pub fn array(element: TypeDescriptor, unique: bool) -> Self {
        Self::new(TypeShape::Array {
            element: Box::new(element),
            unique,
        })
    }

    /// An open object.
    pub fn object(
        properties: IndexMap<String, TypeDescriptor>,
        required: BTreeSet<String>,
    ) -> Self {
        Self::new(TypeShape::Object {
            properties,
            required,
            additional: Additional::Open,
        })
    }

    /// No typing information.
    pub fn any() -> Self {
        Self::new(TypeShape::Any)
    }

    /// Builds a union, collapsing structural duplicates.
    ///
    /// Nested bare unions are flattened. Zero members give `Any`; a single
    /// remaining member is returned as-is instead of being wrapped.
    pub fn union(members: Vec<TypeDescriptor>) -> Self {
        let mut distinct: Vec<TypeDescriptor> = Vec::with_capacity(members.len());
        for member in members {
            let flattened = match member.shape {
                TypeShape::Union { members: inner, .. }
                    if !member.nullable
                        && member.annotations.is_empty()
                        && member.constraints.is_empty()
                        && member.default.is_none() =>
                {
                    inner
                }
                shape => vec![TypeDescriptor { shape, ..member }],
            };
            for candidate in flattened {
                match distinct.iter_mut().find(|seen| seen.same_but_null(&candidate)) {
                    Some(seen) => seen.nullable |= candidate.nullable,
                    None => distinct.push(candidate),
                }
            }
        }

        match distinct.len() {
            0 => Self::any(),
            1 => distinct.remove(0),
            _ => {
                let distinguishable = Self::pairwise_distinct(&distinct);
                let nullable = distinct.iter().any(|m| m.nullable);
                Self {
                    nullable,
                    ..Self::new(TypeShape::Union {
                        members: distinct,
                        distinguishable,
                    })
                }
            }
        }
    }

    /// Equal apart from the `nullable` flag.
    fn same_but_null(&self, other: &TypeDescriptor) -> bool {
        self.shape == other.shape
            && self.annotations == other.annotations
            && self.constraints == other.constraints
            && self.default == other.default
    }

    fn pairwise_distinct(members: &[TypeDescriptor]) -> bool {
        let mut seen = Vec::with_capacity(members.len());
        for member in members {
            match member.kind_tag() {
                Some(tag) if !seen.contains(&tag) => seen.push(tag),
                _ => return false,
            }
        }
        true
    }

    /// Marks the descriptor nullable.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// The coarse kind, or `None` for `Any` and unions.
    pub fn kind_tag(&self) -> Option<KindTag> {
        match &self.shape {
            TypeShape::Primitive { kind, .. } => Some(KindTag::Primitive(*kind)),
            TypeShape::Array { .. } => Some(KindTag::Array),
            TypeShape::Object { .. } => Some(KindTag::Object),
            TypeShape::Union { .. } | TypeShape::Any => None,
        }
    }

    /// Whether the shape is an object.
    pub fn is_object(&self) -> bool {
        matches!(self.shape, TypeShape::Object { .. })
    }

    /// Whether the shape is an array.
    pub fn is_array(&self) -> bool {
        matches!(self.shape, TypeShape::Array { .. })
    }

    /// Rebuilds a schema node that normalizes back to this descriptor.
    pub fn as_node(&self) -> SchemaNode {
        let mut node = SchemaNode {
            nullable: self.nullable,
            read_only: self.annotations.read_only,
            write_only: self.annotations.write_only,
            deprecated: self.annotations.deprecated,
            default: self.default.clone(),
            ..SchemaNode::default()
        };
        self.constraints.apply_to(&mut node);

        match &self.shape {
            TypeShape::Primitive { kind, format } => {
                node.schema_type = Some((*kind).into());
                node.format = format.clone();
            }
            TypeShape::Array { element, unique } => {
                node.schema_type = Some(SchemaType::Array);
                node.items = Some(SchemaOrRef::inline(element.as_node()));
                node.unique_items = *unique;
            }
            TypeShape::Object {
                properties,
                required,
                additional,
            } => {
                node.schema_type = Some(SchemaType::Object);
                node.properties = properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), SchemaOrRef::inline(prop.as_node())))
                    .collect();
                node.required = required.iter().cloned().collect();
                node.additional_properties = match additional {
                    Additional::Open => None,
                    Additional::Closed => Some(AdditionalSchema::Allowed(false)),
                    Additional::Typed(extra) => Some(AdditionalSchema::Schema(
                        SchemaOrRef::inline(extra.as_node()),
                    )),
                };
            }
            TypeShape::Union { members, .. } => {
                node.one_of = members
                    .iter()
                    .map(|m| SchemaOrRef::inline(m.as_node()))
                    .collect();
            }
            TypeShape::Any => {}
        }
        node
    }

    /// Checks a JSON value against the shape, nullability and constraints.
    ///
    /// Unions accept a value when any member does.
    pub fn check(&self, value: &Value, path: &str) -> ValidationResult<()> {
        if value.is_null() {
            return if self.nullable || matches!(self.shape, TypeShape::Any) {
                Ok(())
            } else {
                Err(violation(path, "null is not allowed"))
            };
        }

        if let Some(allowed) = &self.constraints.enumeration {
            if !allowed.contains(value) {
                return Err(violation(path, "value is not one of the enumerated values"));
            }
        }

        match &self.shape {
            TypeShape::Primitive { kind, format } => {
                check_primitive(*kind, format.as_deref(), &self.constraints, value, path)
            }
            TypeShape::Array { element, unique } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| violation(path, "expected array"))?;
                check_items(items, *unique, &self.constraints, path)?;
                for (idx, item) in items.iter().enumerate() {
                    element.check(item, &format!("{path}/{idx}"))?;
                }
                Ok(())
            }
            TypeShape::Object {
                properties,
                required,
                additional,
            } => {
                let map = value
                    .as_object()
                    .ok_or_else(|| violation(path, "expected object"))?;
                for name in required {
                    if !map.contains_key(name) {
                        return Err(violation(path, &format!("missing required property '{name}'")));
                    }
                }
                for (key, item) in map {
                    let item_path = format!("{path}/{key}");
                    match (properties.get(key), additional) {
                        (Some(prop), _) => prop.check(item, &item_path)?,
                        (None, Additional::Open) => {}
                        (None, Additional::Closed) => {
                            return Err(violation(
                                path,
                                &format!("property '{key}' is not allowed"),
                            ))
                        }
                        (None, Additional::Typed(extra)) => extra.check(item, &item_path)?,
                    }
                }
                Ok(())
            }
            TypeShape::Union { members, .. } => {
                if members.iter().any(|m| m.check(value, path).is_ok()) {
                    Ok(())
                } else {
                    Err(ValidationError::NoMatch {
                        path: path.to_string(),
                        branches: members.len(),
                    })
                }
            }
            TypeShape::Any => Ok(()),
        }
    }

    /// `check` as a predicate.
    pub fn accepts(&self, value: &Value) -> bool {
        self.check(value, "").is_ok()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            TypeShape::Primitive { kind, format } => match format {
                Some(format) => write!(f, "{kind}({format})")?,
                None => write!(f, "{kind}")?,
            },
            TypeShape::Array { element, .. } => write!(f, "array<{element}>")?,
            TypeShape::Object { properties, .. } => {
                let names: Vec<&str> = properties.keys().map(String::as_str).collect();
                write!(f, "object{{{}}}", names.join(","))?
            }
            TypeShape::Union { members, .. } => {
                let parts: Vec<String> = members.iter().map(ToString::to_string).collect();
                write!(f, "union<{}>", parts.join("|"))?
            }
            TypeShape::Any => f.write_str("any")?,
        }
        if self.nullable {
            f.write_str("?")?;
        }
        Ok(())
    }
}

pub(crate) fn violation(path: &str, message: &str) -> ValidationError {
    ValidationError::Schema {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// Integral JSON numbers, including floats without a fractional part.
pub(crate) fn as_integral(value: &Value) -> Option<i128> {
    if let Some(i) = value.as_i64() {
        return Some(i128::from(i));
    }
    if let Some(u) = value.as_u64() {
        return Some(i128::from(u));
    }
    let f = value.as_f64()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 1e38).then_some(f as i128)
}

/// Bounds implied by an integer `format`.
pub(crate) fn format_bounds(format: Option<&str>) -> Option<(i128, i128)> {
    match format {
        Some("int32") => Some((i128::from(i32::MIN), i128::from(i32::MAX))),
        Some("int64") => Some((i128::from(i64::MIN), i128::from(i64::MAX))),
        _ => None,
    }
}

fn check_primitive(
    kind: PrimitiveKind,
    format: Option<&str>,
    constraints: &Constraints,
    value: &Value,
    path: &str,
) -> ValidationResult<()> {
    match kind {
        PrimitiveKind::String => {
            let text = value
                .as_str()
                .ok_or_else(|| violation(path, "expected string"))?;
            check_string(text, constraints, path)
        }
        PrimitiveKind::Boolean => value
            .is_boolean()
            .then_some(())
            .ok_or_else(|| violation(path, "expected boolean")),
        PrimitiveKind::Integer => {
            let int = as_integral(value).ok_or_else(|| violation(path, "expected integer"))?;
            if let Some((min, max)) = format_bounds(format) {
                if int < min || int > max {
                    return Err(violation(path, "integer is out of range for its format"));
                }
            }
            check_number(int as f64, constraints, path)
        }
        PrimitiveKind::Number => {
            let number = value
                .as_f64()
                .ok_or_else(|| violation(path, "expected number"))?;
            check_number(number, constraints, path)
        }
    }
}

/// Read access to the constraint keywords, shared by descriptors and raw nodes.
pub(crate) trait Bounds {
    fn min_length(&self) -> Option<u64>;
    fn max_length(&self) -> Option<u64>;
    fn pattern(&self) -> Option<&Pattern>;
    fn minimum(&self) -> Option<(f64, bool)>;
    fn maximum(&self) -> Option<(f64, bool)>;
    fn multiple_of(&self) -> Option<f64>;
    fn min_items(&self) -> Option<u64>;
    fn max_items(&self) -> Option<u64>;
}

macro_rules! impl_bounds {
    ($ty:ty) => {
        impl Bounds for $ty {
            fn min_length(&self) -> Option<u64> {
                self.min_length
            }
            fn max_length(&self) -> Option<u64> {
                self.max_length
            }
            fn pattern(&self) -> Option<&Pattern> {
                self.pattern.as_ref()
            }
            fn minimum(&self) -> Option<(f64, bool)> {
                self.minimum.map(|min| (min, self.exclusive_minimum))
            }
            fn maximum(&self) -> Option<(f64, bool)> {
                self.maximum.map(|max| (max, self.exclusive_maximum))
            }
            fn multiple_of(&self) -> Option<f64> {
                self.multiple_of
            }
            fn min_items(&self) -> Option<u64> {
                self.min_items
            }
            fn max_items(&self) -> Option<u64> {
                self.max_items
            }
        }
    };
}

impl_bounds!(Constraints);
impl_bounds!(SchemaNode);

pub(crate) fn check_string<B: Bounds>(text: &str, bounds: &B, path: &str) -> ValidationResult<()> {
    let length = text.chars().count() as u64;
    if bounds.min_length().is_some_and(|min| length < min) {
        return Err(violation(path, "string is shorter than minLength"));
    }
    if bounds.max_length().is_some_and(|max| length > max) {
        return Err(violation(path, "string is longer than maxLength"));
    }
    if let Some(pattern) = bounds.pattern() {
        if !pattern.is_match(text) {
            return Err(violation(
                path,
                &format!("string does not match pattern {:?}", pattern.as_str()),
            ));
        }
    }
    Ok(())
}

pub(crate) fn check_number<B: Bounds>(number: f64, bounds: &B, path: &str) -> ValidationResult<()> {
    if let Some((min, exclusive)) = bounds.minimum() {
        if number < min || (exclusive && number == min) {
            return Err(violation(path, &format!("value is below the minimum {min}")));
        }
    }
    if let Some((max, exclusive)) = bounds.maximum() {
        if number > max || (exclusive && number == max) {
            return Err(violation(path, &format!("value is above the maximum {max}")));
        }
    }
    if let Some(step) = bounds.multiple_of() {
        let quotient = number / step;
        if step > 0.0 && (quotient - quotient.round()).abs() > 1e-9 {
            return Err(violation(path, &format!("value is not a multiple of {step}")));
        }
    }
    Ok(())
}

pub(crate) fn check_items<B: Bounds>(
    items: &[Value],
    unique: bool,
    bounds: &B,
    path: &str,
) -> ValidationResult<()> {
    let count = items.len() as u64;
    if bounds.min_items().is_some_and(|min| count < min) {
        return Err(violation(path, "array has fewer items than minItems"));
    }
    if bounds.max_items().is_some_and(|max| count > max) {
        return Err(violation(path, "array has more items than maxItems"));
    }
    if unique {
        for (idx, item) in items.iter().enumerate() {
            if items[..idx].contains(item) {
                return Err(violation(path, "array items are not unique"));
            }
        }
    }
    Ok(())
}

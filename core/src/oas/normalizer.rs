#![deny(missing_docs)]

//! # Schema Normalizer
//!
//! Turns a (possibly composed, possibly referenced) schema node into a
//! composition-free [`TypeDescriptor`].
//!
//! Priority:
//! 1. `allOf` merges its members (plus the node's own shape, if any).
//! 2. `oneOf`/`anyOf` on a node without its own shape become a union.
//! 3. Otherwise `type`, `items` and `properties` decide the shape.
//!
//! `nullable`, annotations, constraints and `default` of the node are applied
//! on top of whichever shape was reached. Every nested schema is normalized at
//! least once, so every reachable `$ref` is resolved and cycle-checked here.

use crate::error::{SpecError, SpecResult, SpecWarning, WarningKind};
use crate::oas::descriptor::{
    Additional, Annotations, Constraints, KindTag, PrimitiveKind, TypeDescriptor, TypeShape,
};
use crate::oas::ref_utils::canonical_pointer;
use crate::oas::refs::{ResolvedRefs, Resolver};
use crate::oas::schema::{AdditionalSchema, SchemaNode, SchemaOrRef, SchemaType};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{trace, warn};

static EMPTY_DOCUMENT: Value = Value::Null;

/// Normalizes a standalone node. Any `$ref` inside it fails as unresolved.
pub fn normalize(node: &SchemaNode) -> SpecResult<TypeDescriptor> {
    Normalizer::new(&EMPTY_DOCUMENT, false).normalize(node, "#")
}

/// Load-time normalizer bound to one document.
#[derive(Debug)]
pub struct Normalizer<'d> {
    resolver: Resolver<'d>,
    strict: bool,
    cache: HashMap<String, TypeDescriptor>,
    warnings: Vec<SpecWarning>,
}

impl<'d> Normalizer<'d> {
    /// Creates a normalizer. In strict mode every warning is fatal.
    pub fn new(document: &'d Value, strict: bool) -> Self {
        Self {
            resolver: Resolver::new(document),
            strict,
            cache: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// The underlying resolver.
    pub fn resolver(&self) -> &Resolver<'d> {
        &self.resolver
    }

    /// Records a non-fatal finding, or fails in strict mode.
    pub fn warn(&mut self, at: &str, kind: WarningKind) -> SpecResult<()> {
        let warning = SpecWarning {
            at: at.to_string(),
            kind,
        };
        if self.strict {
            return Err(warning.into_error());
        }
        warn!(at = %warning.at, "{}", warning.kind);
        self.warnings.push(warning);
        Ok(())
    }

    /// Ends the load.
    pub fn finish(self) -> (ResolvedRefs, Vec<SpecWarning>) {
        (self.resolver.freeze(), self.warnings)
    }

    /// Normalizes a schema position, following and caching references.
    pub fn normalize_schema(&mut self, schema: &SchemaOrRef, at: &str) -> SpecResult<TypeDescriptor> {
        let reference = match schema {
            SchemaOrRef::Inline(node) => return self.normalize(node, at),
            SchemaOrRef::Ref(reference) => reference,
        };

        let pointer = canonical_pointer(&reference.pointer)?;
        if let Some(cached) = self.cache.get(&pointer) {
            return Ok(cached.clone());
        }

        let node = self.resolver.resolve_ref(reference)?;
        self.resolver.enter(&pointer)?;
        let normalized = self.normalize(&node, &pointer);
        self.resolver.leave();
        let descriptor = normalized?;

        trace!(pointer = %pointer, descriptor = %descriptor, "normalized referenced schema");
        self.cache.insert(pointer, descriptor.clone());
        Ok(descriptor)
    }

    /// Normalizes a concrete node.
    pub fn normalize(&mut self, node: &SchemaNode, at: &str) -> SpecResult<TypeDescriptor> {
        check_bounds(node, at)?;

        let alternatives_typed = node.all_of.is_empty()
            && !has_own_shape(node)
            && (!node.one_of.is_empty() || !node.any_of.is_empty());

        let mut descriptor = if !node.all_of.is_empty() {
            self.merge_all_of(node, at)?
        } else if alternatives_typed {
            self.alternatives(node, at)?
        } else {
            self.shape_of(node, at)?
        };

        // Positions that did not contribute to the shape still get visited.
        if !alternatives_typed {
            for (keyword, members) in [("oneOf", &node.one_of), ("anyOf", &node.any_of)] {
                for (idx, member) in members.iter().enumerate() {
                    self.normalize_schema(member, &format!("{at}/{keyword}/{idx}"))?;
                }
            }
        }
        if let Some(not) = &node.not {
            self.normalize_schema(not, &format!("{at}/not"))?;
        }

        descriptor.nullable |= node.nullable;
        descriptor.annotations.fold(Annotations::from_node(node));
        let mut constraints = Constraints::from_node(node);
        constraints.fill_from(&descriptor.constraints);
        descriptor.constraints = constraints;
        if node.default.is_some() {
            descriptor.default = node.default.clone();
        }

        if let Some(default) = &descriptor.default {
            descriptor
                .check(default, at)
                .map_err(|e| SpecError::Inconsistency {
                    at: at.to_string(),
                    reason: format!("default {default} does not match its own schema: {e}"),
                })?;
        }

        Ok(descriptor)
    }

    fn shape_of(&mut self, node: &SchemaNode, at: &str) -> SpecResult<TypeDescriptor> {
        let is_array = node.schema_type == Some(SchemaType::Array)
            || (node.schema_type.is_none() && node.items.is_some());
        let is_object = node.schema_type == Some(SchemaType::Object)
            || (node.schema_type.is_none()
                && (!node.properties.is_empty() || node.additional_properties.is_some()));

        if is_array {
            let element = match &node.items {
                Some(items) => self.normalize_schema(items, &format!("{at}/items"))?,
                None => TypeDescriptor::any(),
            };
            return Ok(TypeDescriptor::array(element, node.unique_items));
        }

        if is_object {
            let mut properties = IndexMap::with_capacity(node.properties.len());
            for (name, prop) in &node.properties {
                let prop_at = format!("{at}/properties/{name}");
                properties.insert(name.clone(), self.normalize_schema(prop, &prop_at)?);
            }
            let additional = match &node.additional_properties {
                None | Some(AdditionalSchema::Allowed(true)) => Additional::Open,
                Some(AdditionalSchema::Allowed(false)) => Additional::Closed,
                Some(AdditionalSchema::Schema(extra)) => Additional::Typed(Box::new(
                    self.normalize_schema(extra, &format!("{at}/additionalProperties"))?,
                )),
            };
            return Ok(TypeDescriptor::new(TypeShape::Object {
                properties,
                required: node.required.iter().cloned().collect(),
                additional,
            }));
        }

        Ok(match node.schema_type {
            Some(SchemaType::String) => primitive(PrimitiveKind::String, node),
            Some(SchemaType::Number) => primitive(PrimitiveKind::Number, node),
            Some(SchemaType::Integer) => primitive(PrimitiveKind::Integer, node),
            Some(SchemaType::Boolean) => primitive(PrimitiveKind::Boolean, node),
            _ => TypeDescriptor::any(),
        })
    }

    fn alternatives(&mut self, node: &SchemaNode, at: &str) -> SpecResult<TypeDescriptor> {
        let mut members = Vec::with_capacity(node.one_of.len() + node.any_of.len());
        for (keyword, list) in [("oneOf", &node.one_of), ("anyOf", &node.any_of)] {
            for (idx, member) in list.iter().enumerate() {
                let descriptor = self.normalize_schema(member, &format!("{at}/{keyword}/{idx}"))?;
                let resolved = self.resolver.resolve(member)?;
                if resolved.is_exclusion_only() {
                    // Only narrows at validation time.
                    continue;
                }
                members.push(descriptor);
            }
        }

        if node.one_of.is_empty() && spans_every_type(&members) {
            return Ok(TypeDescriptor::any());
        }
        Ok(TypeDescriptor::union(members))
    }

    fn merge_all_of(&mut self, node: &SchemaNode, at: &str) -> SpecResult<TypeDescriptor> {
        let mut members = Vec::with_capacity(node.all_of.len() + 1);
        if has_own_shape(node) {
            members.push(self.shape_of(node, at)?);
        }
        for (idx, member) in node.all_of.iter().enumerate() {
            members.push(self.normalize_schema(member, &format!("{at}/allOf/{idx}"))?);
        }

        let mut annotations = Annotations::default();
        let mut constraints = Constraints::default();
        let mut default = None;
        let mut objects = Vec::new();
        let mut others = Vec::new();
        for member in members {
            annotations.fold(member.annotations);
            constraints.fill_from(&member.constraints);
            if default.is_none() {
                default = member.default.clone();
            }
            match member.shape {
                TypeShape::Object { .. } => objects.push(member),
                TypeShape::Any => {}
                _ => others.push(member),
            }
        }

        let mut merged = if !objects.is_empty() {
            self.merge_objects(objects, at)?
        } else if let Some((first, rest)) = others.split_first() {
            self.merge_scalars(first, rest, at)?
        } else {
            TypeDescriptor::any()
        };
        merged.nullable = false;
        merged.annotations = annotations;
        merged.constraints = constraints;
        merged.default = default;
        Ok(merged)
    }

    fn merge_objects(&mut self, objects: Vec<TypeDescriptor>, at: &str) -> SpecResult<TypeDescriptor> {
        let mut properties: IndexMap<String, TypeDescriptor> = IndexMap::new();
        let mut required = BTreeSet::new();
        let mut additional = Additional::Open;

        for object in objects {
            let TypeShape::Object {
                properties: member_props,
                required: member_required,
                additional: member_additional,
            } = object.shape
            else {
                continue;
            };
            for (name, prop) in member_props {
                match properties.get(&name) {
                    Some(existing) if *existing != prop => {
                        self.warn(at, WarningKind::PropertyConflict { property: name })?;
                    }
                    Some(_) => {}
                    None => {
                        properties.insert(name, prop);
                    }
                }
            }
            required.extend(member_required);
            if additional == Additional::Open {
                additional = member_additional;
            }
        }

        Ok(TypeDescriptor::new(TypeShape::Object {
            properties,
            required,
            additional,
        }))
    }

    fn merge_scalars(
        &mut self,
        first: &TypeDescriptor,
        rest: &[TypeDescriptor],
        at: &str,
    ) -> SpecResult<TypeDescriptor> {
        let mut merged = TypeDescriptor::new(first.shape.clone());
        for other in rest {
            let inconsistent = || SpecError::Inconsistency {
                at: at.to_string(),
                reason: format!("allOf cannot combine {first} with {other}"),
            };
            // A union only keeps the members the other side can also be.
            let narrowed = keep_kinds(&merged, &kinds(other)).ok_or_else(inconsistent)?;
            let other = keep_kinds(other, &kinds(&narrowed)).ok_or_else(inconsistent)?;
            merged = narrowed;
            if other.kind_tag() != merged.kind_tag() {
                return Err(inconsistent());
            }
            match (&mut merged.shape, &other.shape) {
                (
                    TypeShape::Primitive { format, .. },
                    TypeShape::Primitive {
                        format: other_format,
                        ..
                    },
                ) => {
                    if format.is_none() {
                        format.clone_from(other_format);
                    }
                }
                (
                    TypeShape::Array { element, unique },
                    TypeShape::Array {
                        element: other_element,
                        unique: other_unique,
                    },
                ) => {
                    *unique |= *other_unique;
                    if **element != **other_element {
                        self.warn(at, WarningKind::ElementConflict)?;
                    }
                }
                _ => {}
            }
        }
        Ok(merged)
    }
}

fn kinds(descriptor: &TypeDescriptor) -> Vec<Option<KindTag>> {
    match &descriptor.shape {
        TypeShape::Union { members, .. } => members.iter().map(TypeDescriptor::kind_tag).collect(),
        _ => vec![descriptor.kind_tag()],
    }
}

/// `descriptor` restricted to `allowed` kinds, `None` when nothing is left.
fn keep_kinds(descriptor: &TypeDescriptor, allowed: &[Option<KindTag>]) -> Option<TypeDescriptor> {
    match &descriptor.shape {
        TypeShape::Union { members, .. } => {
            let kept: Vec<TypeDescriptor> = members
                .iter()
                .filter(|member| allowed.contains(&member.kind_tag()))
                .cloned()
                .collect();
            (!kept.is_empty()).then(|| TypeDescriptor::union(kept))
        }
        _ => allowed
            .contains(&descriptor.kind_tag())
            .then(|| descriptor.clone()),
    }
}

fn primitive(kind: PrimitiveKind, node: &SchemaNode) -> TypeDescriptor {
    TypeDescriptor::primitive(kind, node.format.as_deref())
}

fn has_own_shape(node: &SchemaNode) -> bool {
    node.schema_type.is_some()
        || node.items.is_some()
        || !node.properties.is_empty()
        || node.additional_properties.is_some()
}

fn spans_every_type(members: &[TypeDescriptor]) -> bool {
    let tags: HashSet<KindTag> = members.iter().filter_map(TypeDescriptor::kind_tag).collect();
    [
        KindTag::Primitive(PrimitiveKind::String),
        KindTag::Primitive(PrimitiveKind::Number),
        KindTag::Primitive(PrimitiveKind::Integer),
        KindTag::Primitive(PrimitiveKind::Boolean),
        KindTag::Array,
        KindTag::Object,
    ]
    .iter()
    .all(|tag| tags.contains(tag))
}

fn check_bounds(node: &SchemaNode, at: &str) -> SpecResult<()> {
    let inconsistent = |reason: &str| SpecError::Inconsistency {
        at: at.to_string(),
        reason: reason.to_string(),
    };
    if let (Some(min), Some(max)) = (node.min_length, node.max_length) {
        if min > max {
            return Err(inconsistent("minLength is greater than maxLength"));
        }
    }
    if let (Some(min), Some(max)) = (node.minimum, node.maximum) {
        if min > max {
            return Err(inconsistent("minimum is greater than maximum"));
        }
    }
    if let (Some(min), Some(max)) = (node.min_items, node.max_items) {
        if min > max {
            return Err(inconsistent("minItems is greater than maxItems"));
        }
    }
    if node.multiple_of.is_some_and(|step| step <= 0.0) {
        return Err(inconsistent("multipleOf must be greater than zero"));
    }
    Ok(())
}

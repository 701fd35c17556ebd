#![deny(missing_docs)]

//! # Reference Resolver
//!
//! Follows `$ref` pointers inside one loaded document.
//!
//! - Resolution is memoized per load: a pointer always yields the same
//!   `Arc<SchemaNode>`, so identity comparisons downstream are meaningful.
//! - A stack of in-progress pointers is kept for the current traversal;
//!   re-entering a pointer still on the stack is a [`SpecError::CyclicReference`].
//! - Once loading finishes the memo is frozen into [`ResolvedRefs`] and shared
//!   read-only by every operation of the set.

use crate::error::{SpecError, SpecResult};
use crate::oas::ref_utils::{canonical_pointer, lookup_pointer};
use crate::oas::schema::{Reference, SchemaNode, SchemaOrRef};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Load-time resolver bound to one document.
#[derive(Debug)]
pub struct Resolver<'d> {
    document: &'d Value,
    resolved: HashMap<String, Arc<SchemaNode>>,
    in_progress: Vec<String>,
}

impl<'d> Resolver<'d> {
    /// Creates a resolver with an empty memo.
    pub fn new(document: &'d Value) -> Self {
        Self {
            document,
            resolved: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// The document being resolved against.
    pub fn document(&self) -> &'d Value {
        self.document
    }

    /// Resolves a schema position to a concrete node.
    pub fn resolve(&mut self, schema: &SchemaOrRef) -> SpecResult<Arc<SchemaNode>> {
        match schema {
            SchemaOrRef::Inline(node) => Ok(Arc::clone(node)),
            SchemaOrRef::Ref(reference) => self.resolve_ref(reference),
        }
    }

    /// Resolves a `$ref`, following chains of references.
    pub fn resolve_ref(&mut self, reference: &Reference) -> SpecResult<Arc<SchemaNode>> {
        let pointer = canonical_pointer(&reference.pointer)?;
        if let Some(node) = self.resolved.get(&pointer) {
            return Ok(Arc::clone(node));
        }

        self.enter(&pointer)?;
        let loaded = self.load_schema(&pointer, reference);
        self.leave();
        let node = loaded?;

        trace!(pointer = %pointer, "resolved schema reference");
        self.resolved.insert(pointer, Arc::clone(&node));
        Ok(node)
    }

    fn load_schema(&mut self, pointer: &str, reference: &Reference) -> SpecResult<Arc<SchemaNode>> {
        let value = lookup_pointer(self.document, &reference.pointer)?;
        let parsed =
            SchemaOrRef::from_value(value.clone()).map_err(|e| SpecError::Inconsistency {
                at: pointer.to_string(),
                reason: e.to_string(),
            })?;
        match parsed {
            SchemaOrRef::Inline(node) => Ok(node),
            SchemaOrRef::Ref(next) => self.resolve_ref(&next),
        }
    }

    /// Marks `pointer` as being traversed.
    pub fn enter(&mut self, pointer: &str) -> SpecResult<()> {
        if let Some(start) = self.in_progress.iter().position(|p| p == pointer) {
            let mut cycle = self.in_progress[start..].to_vec();
            cycle.push(pointer.to_string());
            return Err(SpecError::CyclicReference { cycle });
        }
        self.in_progress.push(pointer.to_string());
        Ok(())
    }

    /// Pops the most recently entered pointer.
    pub fn leave(&mut self) {
        self.in_progress.pop();
    }

    /// Follows `$ref` chains for non-schema objects (parameters, request bodies,
    /// responses, headers). Returns the pointer of the final target, if any
    /// reference was followed, and the target itself.
    pub fn resolve_object(&self, value: &'d Value) -> SpecResult<(Option<String>, &'d Value)> {
        let mut current = value;
        let mut chain: Vec<String> = Vec::new();
        while let Some(raw) = current.get("$ref") {
            let raw = raw
                .as_str()
                .ok_or_else(|| SpecError::InvalidDocument("`$ref` must be a string".into()))?;
            let pointer = canonical_pointer(raw)?;
            if chain.contains(&pointer) {
                chain.push(pointer);
                return Err(SpecError::CyclicReference { cycle: chain });
            }
            chain.push(pointer);
            current = lookup_pointer(self.document, raw)?;
        }
        Ok((chain.pop(), current))
    }

    /// Ends the load, keeping every resolved node.
    pub fn freeze(self) -> ResolvedRefs {
        ResolvedRefs {
            nodes: self.resolved,
        }
    }
}

/// The frozen pointer table of one load.
#[derive(Debug, Default)]
pub struct ResolvedRefs {
    nodes: HashMap<String, Arc<SchemaNode>>,
}

impl ResolvedRefs {
    /// Looks up a resolved reference.
    pub fn get(&self, reference: &Reference) -> Option<Arc<SchemaNode>> {
        let pointer = canonical_pointer(&reference.pointer).ok()?;
        self.nodes.get(&pointer).cloned()
    }

    /// Resolves a schema position without touching the document.
    pub fn resolve(&self, schema: &SchemaOrRef) -> Option<Arc<SchemaNode>> {
        match schema {
            SchemaOrRef::Inline(node) => Some(Arc::clone(node)),
            SchemaOrRef::Ref(reference) => self.get(reference),
        }
    }

    /// Number of distinct pointers resolved.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing was referenced.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference(pointer: &str) -> Reference {
        Reference {
            pointer: pointer.to_string(),
        }
    }

    #[test]
    fn test_memoized_identity() {
        let doc = json!({"components": {"schemas": {"Pet": {"type": "object"}}}});
        let mut resolver = Resolver::new(&doc);
        let a = resolver.resolve_ref(&reference("#/components/schemas/Pet")).unwrap();
        let b = resolver.resolve_ref(&reference("#/components/schemas/Pet")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_ref_chain_followed() {
        let doc = json!({"components": {"schemas": {
            "Alias": {"$ref": "#/components/schemas/Id"},
            "Id": {"type": "integer"}
        }}});
        let mut resolver = Resolver::new(&doc);
        let alias = resolver.resolve_ref(&reference("#/components/schemas/Alias")).unwrap();
        let id = resolver.resolve_ref(&reference("#/components/schemas/Id")).unwrap();
        assert!(Arc::ptr_eq(&alias, &id));
    }

    #[test]
    fn test_ref_chain_cycle() {
        let doc = json!({"components": {"schemas": {
            "A": {"$ref": "#/components/schemas/B"},
            "B": {"$ref": "#/components/schemas/A"}
        }}});
        let mut resolver = Resolver::new(&doc);
        match resolver.resolve_ref(&reference("#/components/schemas/A")) {
            Err(SpecError::CyclicReference { cycle }) => {
                assert_eq!(
                    cycle,
                    vec![
                        "#/components/schemas/A".to_string(),
                        "#/components/schemas/B".to_string(),
                        "#/components/schemas/A".to_string()
                    ]
                );
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_external_reference() {
        let doc = json!({});
        let mut resolver = Resolver::new(&doc);
        assert!(matches!(
            resolver.resolve_ref(&reference("common.yaml#/Pet")),
            Err(SpecError::UnsupportedReference { .. })
        ));
    }

    #[test]
    fn test_resolve_object_chain() {
        let doc = json!({"components": {"parameters": {
            "Limit": {"$ref": "#/components/parameters/Base"},
            "Base": {"name": "limit", "in": "query"}
        }}});
        let param = json!({"$ref": "#/components/parameters/Limit"});
        let resolver = Resolver::new(&doc);
        let (origin, target) = resolver.resolve_object(&param).unwrap();
        assert_eq!(origin.as_deref(), Some("#/components/parameters/Base"));
        assert_eq!(target["name"], json!("limit"));
    }

    #[test]
    fn test_freeze_keeps_nodes() {
        let doc = json!({"components": {"schemas": {"Pet": {"type": "object"}}}});
        let mut resolver = Resolver::new(&doc);
        let node = resolver.resolve_ref(&reference("#/components/schemas/Pet")).unwrap();
        let frozen = resolver.freeze();
        assert_eq!(frozen.len(), 1);
        let again = frozen.get(&reference("#/components/schemas/Pet")).unwrap();
        assert!(Arc::ptr_eq(&node, &again));
    }
}

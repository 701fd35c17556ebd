#![deny(missing_docs)]

//! # Composition Evaluator
//!
//! Validates JSON values against the raw schema nodes of a loaded operation,
//! including `oneOf`, `anyOf`, `allOf` and `not`.
//!
//! Every `$ref` met here was resolved at load time, so evaluation only reads
//! the frozen [`ResolvedRefs`] table and never touches the document.

use crate::error::{ValidationError, ValidationResult};
use crate::oas::descriptor::{
    as_integral, check_items, check_number, check_string, format_bounds, violation,
};
use crate::oas::refs::ResolvedRefs;
use crate::oas::schema::{AdditionalSchema, SchemaNode, SchemaOrRef, SchemaType};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Which side of the exchange a value is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server. Required `readOnly` properties may be omitted.
    Request,
    /// Server to client. Required `writeOnly` properties may be omitted.
    Response,
}

/// Schema walker for one direction.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    refs: &'a ResolvedRefs,
    direction: Direction,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator over a frozen reference table.
    pub fn new(refs: &'a ResolvedRefs, direction: Direction) -> Self {
        Self { refs, direction }
    }

    /// Validates `value` against a schema position.
    pub fn validate(&self, value: &Value, schema: &SchemaOrRef, path: &str) -> ValidationResult<()> {
        let node = self.resolve(schema, path)?;
        self.validate_node(value, &node, path)
    }

    /// `validate` as a predicate.
    pub fn accepts(&self, value: &Value, schema: &SchemaOrRef) -> bool {
        self.validate(value, schema, "").is_ok()
    }

    fn resolve(&self, schema: &SchemaOrRef, path: &str) -> ValidationResult<Arc<SchemaNode>> {
        self.refs.resolve(schema).ok_or_else(|| match schema {
            SchemaOrRef::Ref(reference) => {
                violation(path, &format!("reference '{reference}' was not resolved at load"))
            }
            SchemaOrRef::Inline(_) => violation(path, "schema is unavailable"),
        })
    }

    /// Validates `value` against a concrete node.
    pub fn validate_node(&self, value: &Value, node: &SchemaNode, path: &str) -> ValidationResult<()> {
        if value.is_null() {
            if node.nullable {
                return Ok(());
            }
            if node.schema_type.is_some() {
                return Err(violation(path, "null is not allowed"));
            }
        }

        if let Some(allowed) = &node.enumeration {
            if !allowed.contains(value) {
                return Err(violation(path, "value is not one of the enumerated values"));
            }
        }
        if let Some(expected) = node.schema_type {
            check_type(value, expected, node.format.as_deref(), path)?;
        }

        match value {
            Value::String(text) => check_string(text, node, path)?,
            Value::Number(number) => {
                if let Some(float) = number.as_f64() {
                    check_number(float, node, path)?;
                }
            }
            Value::Array(items) => {
                check_items(items, node.unique_items, node, path)?;
                if let Some(item_schema) = &node.items {
                    for (idx, item) in items.iter().enumerate() {
                        self.validate(item, item_schema, &format!("{path}/{idx}"))?;
                    }
                }
            }
            Value::Object(map) => self.check_object(map, node, path)?,
            Value::Null | Value::Bool(_) => {}
        }

        self.check_composition(value, node, path)
    }

    fn check_object(&self, map: &Map<String, Value>, node: &SchemaNode, path: &str) -> ValidationResult<()> {
        for name in &node.required {
            if map.contains_key(name) || self.exempt(node.properties.get(name), path)? {
                continue;
            }
            return Err(violation(path, &format!("missing required property '{name}'")));
        }

        for (key, item) in map {
            let item_path = format!("{path}/{key}");
            if let Some(prop) = node.properties.get(key) {
                self.validate(item, prop, &item_path)?;
                continue;
            }
            match &node.additional_properties {
                None | Some(AdditionalSchema::Allowed(true)) => {}
                Some(AdditionalSchema::Allowed(false)) => {
                    return Err(violation(path, &format!("property '{key}' is not allowed")))
                }
                Some(AdditionalSchema::Schema(extra)) => self.validate(item, extra, &item_path)?,
            }
        }
        Ok(())
    }

    /// A required property that the current direction never carries.
    fn exempt(&self, prop: Option<&SchemaOrRef>, path: &str) -> ValidationResult<bool> {
        let Some(prop) = prop else {
            return Ok(false);
        };
        let node = self.resolve(prop, path)?;
        Ok(match self.direction {
            Direction::Request => node.read_only,
            Direction::Response => node.write_only,
        })
    }

    fn check_composition(&self, value: &Value, node: &SchemaNode, path: &str) -> ValidationResult<()> {
        for member in &node.all_of {
            self.validate(value, member, path)?;
        }

        if !node.any_of.is_empty() && !node.any_of.iter().any(|m| self.accepts(value, m)) {
            return Err(ValidationError::NoMatch {
                path: path.to_string(),
                branches: node.any_of.len(),
            });
        }

        if !node.one_of.is_empty() {
            let matched = node.one_of.iter().filter(|m| self.accepts(value, m)).count();
            match matched {
                1 => {}
                0 => {
                    return Err(ValidationError::NoMatch {
                        path: path.to_string(),
                        branches: node.one_of.len(),
                    })
                }
                matched => {
                    return Err(ValidationError::AmbiguousOneOf {
                        path: path.to_string(),
                        matched,
                    })
                }
            }
        }

        if let Some(not) = &node.not {
            if self.accepts(value, not) {
                return Err(violation(path, "value matches a schema it must not match"));
            }
        }
        Ok(())
    }
}

fn check_type(value: &Value, expected: SchemaType, format: Option<&str>, path: &str) -> ValidationResult<()> {
    let fits = match expected {
        SchemaType::String => value.is_string(),
        SchemaType::Boolean => value.is_boolean(),
        SchemaType::Number => value.is_number(),
        SchemaType::Array => value.is_array(),
        SchemaType::Object => value.is_object(),
        SchemaType::Integer => {
            let Some(int) = as_integral(value) else {
                return Err(violation(path, "expected integer"));
            };
            if let Some((min, max)) = format_bounds(format) {
                if int < min || int > max {
                    return Err(violation(path, "integer is out of range for its format"));
                }
            }
            true
        }
    };
    if fits {
        Ok(())
    } else {
        Err(violation(path, &format!("expected {}", type_name(expected))))
    }
}

fn type_name(ty: SchemaType) -> &'static str {
    match ty {
        SchemaType::String => "string",
        SchemaType::Number => "number",
        SchemaType::Integer => "integer",
        SchemaType::Boolean => "boolean",
        SchemaType::Array => "array",
        SchemaType::Object => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oas::normalizer::Normalizer;
    use serde_json::json;

    /// Loads every schema under `components/schemas` and returns the frozen table.
    fn load(doc: &Value) -> ResolvedRefs {
        let mut normalizer = Normalizer::new(doc, false);
        if let Some(schemas) = doc["components"]["schemas"].as_object() {
            for name in schemas.keys() {
                let schema = SchemaOrRef::from_value(json!({"$ref": format!("#/components/schemas/{name}")})).unwrap();
                normalizer.normalize_schema(&schema, "#").unwrap();
            }
        }
        normalizer.finish().0
    }

    fn schema(value: Value) -> SchemaOrRef {
        SchemaOrRef::from_value(value).unwrap()
    }

    #[test]
    fn test_one_of_exactly_one() {
        let refs = ResolvedRefs::default();
        let eval = Evaluator::new(&refs, Direction::Request);
        let s = schema(json!({"oneOf": [{"type": "integer"}, {"type": "number"}]}));
        assert_eq!(
            eval.validate(&json!(3), &s, ""),
            Err(ValidationError::AmbiguousOneOf {
                path: "".into(),
                matched: 2
            })
        );
        assert!(eval.validate(&json!(3.5), &s, "").is_ok());
        assert!(matches!(
            eval.validate(&json!("x"), &s, ""),
            Err(ValidationError::NoMatch { branches: 2, .. })
        ));
    }

    #[test]
    fn test_any_of_and_not() {
        let refs = ResolvedRefs::default();
        let eval = Evaluator::new(&refs, Direction::Request);
        let s = schema(json!({"anyOf": [{"type": "string"}, {"type": "integer"}], "not": {"enum": ["forbidden"]}}));
        assert!(eval.validate(&json!("ok"), &s, "").is_ok());
        assert!(eval.validate(&json!(1), &s, "").is_ok());
        assert!(eval.validate(&json!(true), &s, "").is_err());
        assert!(matches!(
            eval.validate(&json!("forbidden"), &s, ""),
            Err(ValidationError::Schema { .. })
        ));
    }

    #[test]
    fn test_all_of_through_refs() {
        let doc = json!({"components": {"schemas": {
            "Named": {"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}},
            "Pet": {"allOf": [{"$ref": "#/components/schemas/Named"},
                {"type": "object", "properties": {"age": {"type": "integer", "minimum": 0}}}]}
        }}});
        let refs = load(&doc);
        let eval = Evaluator::new(&refs, Direction::Request);
        let pet = schema(json!({"$ref": "#/components/schemas/Pet"}));
        assert!(eval.validate(&json!({"name": "rex", "age": 3}), &pet, "").is_ok());
        assert!(eval.validate(&json!({"age": 3}), &pet, "").is_err());
        match eval.validate(&json!({"name": "rex", "age": -1}), &pet, "") {
            Err(ValidationError::Schema { path, .. }) => assert_eq!(path, "/age"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_direction_exempts_required() {
        let refs = ResolvedRefs::default();
        let s = schema(json!({"type": "object", "required": ["id", "password"], "properties": {
            "id": {"type": "integer", "readOnly": true},
            "password": {"type": "string", "writeOnly": true}
        }}));
        let request = Evaluator::new(&refs, Direction::Request);
        assert!(request.validate(&json!({"password": "x"}), &s, "").is_ok());
        assert!(request.validate(&json!({"id": 1}), &s, "").is_err());

        let response = Evaluator::new(&refs, Direction::Response);
        assert!(response.validate(&json!({"id": 1}), &s, "").is_ok());
        assert!(response.validate(&json!({"password": "x"}), &s, "").is_err());
    }

    #[test]
    fn test_nullability() {
        let refs = ResolvedRefs::default();
        let eval = Evaluator::new(&refs, Direction::Response);
        assert!(eval.validate(&Value::Null, &schema(json!({"type": "string", "nullable": true})), "").is_ok());
        assert!(eval.validate(&Value::Null, &schema(json!({"type": "string"})), "").is_err());
        assert!(eval.validate(&Value::Null, &schema(json!({})), "").is_ok());
        assert!(eval
            .validate(&Value::Null, &schema(json!({"oneOf": [{"type": "string"}, {"type": "integer"}]})), "")
            .is_err());
    }

    #[test]
    fn test_closed_object() {
        let refs = ResolvedRefs::default();
        let eval = Evaluator::new(&refs, Direction::Request);
        let s = schema(json!({"type": "object", "properties": {"a": {"type": "integer"}}, "additionalProperties": false}));
        assert!(eval.validate(&json!({"a": 1}), &s, "").is_ok());
        assert!(eval.validate(&json!({"a": 1, "b": 2}), &s, "").is_err());
    }

    #[test]
    fn test_unresolved_reference_reported() {
        let refs = ResolvedRefs::default();
        let eval = Evaluator::new(&refs, Direction::Request);
        let s = schema(json!({"$ref": "#/components/schemas/Missing"}));
        assert!(matches!(
            eval.validate(&json!(1), &s, ""),
            Err(ValidationError::Schema { .. })
        ));
    }
}

#![deny(missing_docs)]

//! # Response/Body Schema Mapper
//!
//! Request bodies and responses share one descriptor per schema. The
//! direction of the exchange decides how `readOnly` and `writeOnly`
//! properties are treated:
//!
//! | direction | readOnly                          | writeOnly |
//! |-----------|-----------------------------------|-----------|
//! | request   | rejected when non-null, else dropped | kept   |
//! | response  | kept                              | stripped  |

use crate::error::{ValidationError, ValidationResult};
use crate::oas::descriptor::{Additional, TypeDescriptor, TypeShape};
use crate::oas::models::MediaType;
use crate::oas::operations::OperationModel;
use crate::runtime::composition::{Direction, Evaluator};
use serde_json::Value;
use tracing::debug;

/// Applies the read/write projection of `direction` to a value in place.
///
/// `path` is the JSON pointer of `value` inside the payload, `""` at the root.
pub fn project_body(
    value: &mut Value,
    descriptor: &TypeDescriptor,
    direction: Direction,
    path: &str,
) -> ValidationResult<()> {
    match (&descriptor.shape, value) {
        (TypeShape::Object { properties, additional, .. }, Value::Object(map)) => {
            let mut dropped: Vec<String> = Vec::new();
            for (key, item) in map.iter_mut() {
                let item_path = format!("{path}/{key}");
                let Some(prop) = properties.get(key) else {
                    if let Additional::Typed(extra) = additional {
                        project_body(item, extra, direction, &item_path)?;
                    }
                    continue;
                };
                match direction {
                    Direction::Request if prop.annotations.read_only => {
                        if !item.is_null() {
                            return Err(ValidationError::ReadOnlyViolation { path: item_path });
                        }
                        dropped.push(key.clone());
                    }
                    Direction::Response if prop.annotations.write_only => dropped.push(key.clone()),
                    _ => project_body(item, prop, direction, &item_path)?,
                }
            }
            if !dropped.is_empty() {
                map.retain(|key, _| !dropped.contains(key));
            }
            Ok(())
        }
        (TypeShape::Array { element, .. }, Value::Array(items)) => {
            for (idx, item) in items.iter_mut().enumerate() {
                project_body(item, element, direction, &format!("{path}/{idx}"))?;
            }
            Ok(())
        }
        (TypeShape::Union { members, .. }, value) => match pick_member(members, value) {
            Some(member) => project_body(value, member, direction, path),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

/// The first member that accepts the value, else the first of the same JSON kind.
fn pick_member<'m>(members: &'m [TypeDescriptor], value: &Value) -> Option<&'m TypeDescriptor> {
    members.iter().find(|m| m.accepts(value)).or_else(|| {
        members.iter().find(|m| match &m.shape {
            TypeShape::Object { .. } => value.is_object(),
            TypeShape::Array { .. } => value.is_array(),
            _ => false,
        })
    })
}

impl OperationModel {
    /// Parses, projects and validates a request body.
    ///
    /// Returns `None` when no body was sent and none is required. JSON
    /// payloads come back as parsed values; other media types come back as
    /// the raw string.
    pub fn validate_body(
        &self,
        raw: Option<&str>,
        content_type: Option<&str>,
    ) -> ValidationResult<Option<Value>> {
        let raw = raw.filter(|text| !text.trim().is_empty());
        let Some(body) = &self.body else {
            return match (raw, content_type) {
                (None, _) => Ok(None),
                (Some(_), ct) => Err(ValidationError::UnsupportedMediaType {
                    content_type: ct.unwrap_or_default().to_string(),
                }),
            };
        };
        let Some(raw) = raw else {
            return if body.required {
                Err(ValidationError::MissingBody)
            } else {
                Ok(None)
            };
        };

        let media = body.select(content_type)?;
        let is_json = media.media_type.is_json()
            || content_type
                .and_then(MediaType::parse)
                .is_some_and(|m| m.is_json());
        if !is_json {
            return Ok(Some(Value::String(raw.to_string())));
        }

        let mut value: Value =
            serde_json::from_str(raw).map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
        let checked = project_body(&mut value, &media.descriptor, Direction::Request, "").and_then(|()| {
            match &media.schema {
                Some(schema) => Evaluator::new(&self.refs, Direction::Request).validate(&value, schema, ""),
                None => Ok(()),
            }
        });
        if let Err(error) = checked {
            debug!(operation = %self.operation_id, %error, "request body rejected");
            return Err(error);
        }
        Ok(Some(value))
    }

    /// Projects, validates and serializes a response value for `status`.
    ///
    /// `writeOnly` properties are always stripped. Schema validation runs
    /// unless disabled in the engine configuration.
    pub fn serialize_response(&self, mut value: Value, status: u16) -> ValidationResult<String> {
        let response = self.response_for(status)?;
        let Some(media) = response.preferred() else {
            return to_json(&value);
        };
        if !media.media_type.is_json() {
            return match value {
                Value::String(text) => Ok(text),
                other => to_json(&other),
            };
        }

        project_body(&mut value, &media.descriptor, Direction::Response, "")?;
        if self.config.validate_responses {
            if let Some(schema) = &media.schema {
                Evaluator::new(&self.refs, Direction::Response)
                    .validate(&value, schema, "")
                    .inspect_err(|error| {
                        debug!(operation = %self.operation_id, status, %error, "response rejected")
                    })?;
            }
        }
        to_json(&value)
    }
}

fn to_json(value: &Value) -> ValidationResult<String> {
    serde_json::to_string(value).map_err(|e| ValidationError::MalformedJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::oas::operations::OperationSet;
    use serde_json::json;
    use std::sync::Arc;

    fn users(config: EngineConfig) -> Arc<OperationModel> {
        let doc = json!({
            "openapi": "3.0.3",
            "paths": {"/users": {"post": {
                "operationId": "createUser",
                "requestBody": {"required": true, "content": {
                    "application/json": {"schema": {"$ref": "#/components/schemas/User"}},
                    "text/plain": {"schema": {"type": "string"}}
                }},
                "responses": {
                    "201": {"description": "created", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/User"}}}},
                    "204": {"description": "empty"}
                }
            }}},
            "components": {"schemas": {"User": {
                "type": "object",
                "required": ["id", "name", "password"],
                "properties": {
                    "id": {"type": "integer", "readOnly": true},
                    "name": {"type": "string"},
                    "password": {"type": "string", "writeOnly": true}
                }
            }}}
        });
        let set = OperationSet::load(&doc, config).unwrap();
        Arc::clone(set.get("createUser").unwrap())
    }

    #[test]
    fn test_read_only_in_request() {
        let op = users(EngineConfig::default());
        let ok = op
            .validate_body(Some(r#"{"name": "ann", "password": "pw"}"#), Some("application/json"))
            .unwrap();
        assert_eq!(ok, Some(json!({"name": "ann", "password": "pw"})));

        let nulled = op
            .validate_body(Some(r#"{"id": null, "name": "ann", "password": "pw"}"#), None)
            .unwrap();
        assert_eq!(nulled, Some(json!({"name": "ann", "password": "pw"})));

        assert_eq!(
            op.validate_body(Some(r#"{"id": 7, "name": "ann", "password": "pw"}"#), None),
            Err(ValidationError::ReadOnlyViolation { path: "/id".into() })
        );
    }

    #[test]
    fn test_body_presence_and_media() {
        let op = users(EngineConfig::default());
        assert_eq!(op.validate_body(None, None), Err(ValidationError::MissingBody));
        assert_eq!(op.validate_body(Some("  "), None), Err(ValidationError::MissingBody));
        assert!(matches!(
            op.validate_body(Some("{"), Some("application/json")),
            Err(ValidationError::MalformedJson(_))
        ));
        assert!(matches!(
            op.validate_body(Some("<a/>"), Some("application/xml")),
            Err(ValidationError::UnsupportedMediaType { .. })
        ));
        assert_eq!(
            op.validate_body(Some("hello"), Some("text/plain")).unwrap(),
            Some(json!("hello"))
        );
    }

    #[test]
    fn test_response_strips_write_only() {
        let op = users(EngineConfig::default());
        let out = op
            .serialize_response(json!({"id": 1, "name": "ann", "password": "pw"}), 201)
            .unwrap();
        assert_eq!(out, r#"{"id":1,"name":"ann"}"#);
    }

    #[test]
    fn test_response_validation_toggle() {
        let strict = users(EngineConfig::default());
        assert!(strict.serialize_response(json!({"name": "ann"}), 201).is_err());

        let relaxed = users(EngineConfig::permissive());
        assert_eq!(
            relaxed.serialize_response(json!({"name": "ann"}), 201).unwrap(),
            r#"{"name":"ann"}"#
        );
    }

    #[test]
    fn test_response_status_selection() {
        let op = users(EngineConfig::default());
        assert_eq!(op.serialize_response(Value::Null, 204).unwrap(), "null");
        assert_eq!(
            op.serialize_response(json!({}), 500),
            Err(ValidationError::UndeclaredStatus { status: 500 })
        );
    }

    #[test]
    fn test_projection_through_arrays_and_unions() {
        let mut item = TypeDescriptor::object(Default::default(), Default::default());
        if let TypeShape::Object { properties, .. } = &mut item.shape {
            let mut secret = TypeDescriptor::string();
            secret.annotations.write_only = true;
            properties.insert("secret".into(), secret);
        }
        let descriptor = TypeDescriptor::array(
            TypeDescriptor::union(vec![item, TypeDescriptor::string()]),
            false,
        );
        let mut value = json!([{"secret": "x", "kept": 1}, "plain"]);
        project_body(&mut value, &descriptor, Direction::Response, "").unwrap();
        assert_eq!(value, json!([{"kept": 1}, "plain"]));
    }
}

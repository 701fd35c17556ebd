#![deny(missing_docs)]

//! # Operation Models
//!
//! Loads an OAS document into an immutable [`OperationSet`]: one
//! [`OperationModel`] per path and method, all sharing the frozen reference
//! table of the load.
//!
//! Loading is all-or-nothing. The first [`SpecError`] aborts the set.

use crate::config::EngineConfig;
use crate::error::{SpecError, SpecResult, SpecWarning, ValidationResult};
use crate::oas::models::{HttpMethod, ParamLocation, ResponseKey};
use crate::oas::normalizer::Normalizer;
use crate::oas::ref_utils::child_pointer;
use crate::oas::refs::ResolvedRefs;
use crate::oas::resolver::body::{build_request_body, BodySpec};
use crate::oas::resolver::params::{build_parameters, ParameterSpec, PathParameters};
use crate::oas::resolver::responses::{build_responses, select_response, ResponseSpec};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// The contract of one path and method.
#[derive(Debug, Clone)]
pub struct OperationModel {
    /// `operationId`, or `"METHOD path"` when the document has none.
    pub operation_id: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template, e.g. `/pets/{id}`.
    pub path: String,
    /// `deprecated`
    pub deprecated: bool,
    /// Parameters, path-level ones first.
    pub parameters: Vec<ParameterSpec>,
    /// Request body, if declared.
    pub body: Option<BodySpec>,
    /// Responses in declaration order.
    pub responses: IndexMap<ResponseKey, ResponseSpec>,
    pub(crate) refs: Arc<ResolvedRefs>,
    pub(crate) config: Arc<EngineConfig>,
}

impl OperationModel {
    /// Looks up a parameter by location and name.
    pub fn parameter(&self, location: ParamLocation, name: &str) -> Option<&ParameterSpec> {
        self.parameters
            .iter()
            .find(|p| p.location == location && p.is_named(name))
    }

    /// The response contract that applies to `status`.
    pub fn response_for(&self, status: u16) -> ValidationResult<&ResponseSpec> {
        select_response(&self.responses, status)
    }

    /// Reference table shared by every operation of the set.
    pub fn refs(&self) -> &ResolvedRefs {
        &self.refs
    }

    /// Configuration the set was loaded with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Everything but the shared tables, built while the normalizer is still live.
struct Draft {
    operation_id: String,
    method: HttpMethod,
    path: String,
    deprecated: bool,
    parameters: Vec<ParameterSpec>,
    body: Option<BodySpec>,
    responses: IndexMap<ResponseKey, ResponseSpec>,
}

/// All operations of one loaded document.
#[derive(Debug, Clone)]
pub struct OperationSet {
    operations: IndexMap<String, Arc<OperationModel>>,
    warnings: Vec<SpecWarning>,
    refs: Arc<ResolvedRefs>,
    config: Arc<EngineConfig>,
}

impl OperationSet {
    /// Builds every operation of `document`.
    pub fn load(document: &Value, config: EngineConfig) -> SpecResult<Self> {
        check_version(document)?;
        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| SpecError::InvalidDocument("missing `paths` object".into()))?;

        let mut normalizer = Normalizer::new(document, config.strict);
        let mut drafts: Vec<Draft> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for (path, item) in paths {
            if path.starts_with("x-") {
                continue;
            }
            let path_at = child_pointer("#/paths", path);
            let (origin, item) = normalizer.resolver().resolve_object(item)?;
            let path_at = origin.unwrap_or(path_at);
            if !item.is_object() {
                return Err(SpecError::InvalidDocument(format!(
                    "{path_at}: path item must be an object"
                )));
            }

            let mut inherited =
                PathParameters::build(&mut normalizer, &config, item.get("parameters"), &path_at)?;
            for method in HttpMethod::ALL {
                let Some(operation) = item.get(method.key()) else {
                    continue;
                };
                let op_at = format!("{path_at}/{}", method.key());
                let draft = build_draft(
                    &mut normalizer,
                    &config,
                    &mut inherited,
                    path,
                    method,
                    operation,
                    &op_at,
                )?;
                if !seen_ids.insert(draft.operation_id.clone()) {
                    return Err(SpecError::Inconsistency {
                        at: op_at,
                        reason: format!("duplicate operationId '{}'", draft.operation_id),
                    });
                }
                debug!(
                    operation = %draft.operation_id,
                    parameters = draft.parameters.len(),
                    responses = draft.responses.len(),
                    "built operation model"
                );
                drafts.push(draft);
            }
            inherited.finish(&mut normalizer)?;
        }

        let (refs, warnings) = normalizer.finish();
        let refs = Arc::new(refs);
        let config = Arc::new(config);
        let operations: IndexMap<String, Arc<OperationModel>> = drafts
            .into_iter()
            .map(|draft| {
                let model = OperationModel {
                    operation_id: draft.operation_id,
                    method: draft.method,
                    path: draft.path,
                    deprecated: draft.deprecated,
                    parameters: draft.parameters,
                    body: draft.body,
                    responses: draft.responses,
                    refs: Arc::clone(&refs),
                    config: Arc::clone(&config),
                };
                (model.operation_id.clone(), Arc::new(model))
            })
            .collect();

        info!(
            operations = operations.len(),
            references = refs.len(),
            warnings = warnings.len(),
            "loaded operation set"
        );
        Ok(Self {
            operations,
            warnings,
            refs,
            config,
        })
    }

    /// Looks up an operation by id.
    pub fn get(&self, operation_id: &str) -> Option<&Arc<OperationModel>> {
        self.operations.get(operation_id)
    }

    /// Looks up an operation by method and path template.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&Arc<OperationModel>> {
        self.operations
            .values()
            .find(|op| op.method == method && op.path == path)
    }

    /// Operations in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<OperationModel>> {
        self.operations.values()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the document declares no operation.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Non-fatal findings of the load.
    pub fn warnings(&self) -> &[SpecWarning] {
        &self.warnings
    }

    /// Reference table of the load.
    pub fn refs(&self) -> &ResolvedRefs {
        &self.refs
    }

    /// Configuration the set was loaded with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn check_version(document: &Value) -> SpecResult<()> {
    let version = document
        .get("openapi")
        .and_then(Value::as_str)
        .ok_or_else(|| SpecError::InvalidDocument("missing `openapi` version string".into()))?;
    if version.split('.').next() != Some("3") {
        return Err(SpecError::InvalidDocument(format!(
            "unsupported openapi version '{version}'"
        )));
    }
    Ok(())
}

fn build_draft<'d>(
    normalizer: &mut Normalizer<'d>,
    config: &EngineConfig,
    inherited: &mut PathParameters,
    path: &str,
    method: HttpMethod,
    operation: &'d Value,
    op_at: &str,
) -> SpecResult<Draft> {
    let operation_id = match operation.get("operationId") {
        Some(Value::String(id)) => id.clone(),
        Some(_) => {
            return Err(SpecError::InvalidDocument(format!(
                "{op_at}: operationId must be a string"
            )))
        }
        None => format!("{method} {path}"),
    };

    let parameters = build_parameters(
        normalizer,
        config,
        inherited,
        operation.get("parameters"),
        op_at,
    )?;
    check_path_template(path, &parameters, op_at)?;

    let body = match operation.get("requestBody") {
        Some(raw) => Some(build_request_body(
            normalizer,
            raw,
            &format!("{op_at}/requestBody"),
        )?),
        None => None,
    };
    let responses = build_responses(
        normalizer,
        operation.get("responses"),
        &format!("{op_at}/responses"),
    )?;

    Ok(Draft {
        operation_id,
        method,
        path: path.to_string(),
        deprecated: operation
            .get("deprecated")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        parameters,
        body,
        responses,
    })
}

/// Names between braces in a path template.
fn template_names(path: &str) -> SpecResult<Vec<&str>> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| SpecError::InvalidDocument(format!("unbalanced braces in path '{path}'")))?;
        names.push(&after[..close]);
        rest = &after[close + 1..];
    }
    Ok(names)
}

fn check_path_template(path: &str, parameters: &[ParameterSpec], at: &str) -> SpecResult<()> {
    let names = template_names(path)?;
    for name in &names {
        if !parameters
            .iter()
            .any(|p| p.location == ParamLocation::Path && p.name == *name)
        {
            return Err(SpecError::Inconsistency {
                at: at.to_string(),
                reason: format!("path template variable '{name}' has no path parameter"),
            });
        }
    }
    for param in parameters.iter().filter(|p| p.location == ParamLocation::Path) {
        if !names.contains(&param.name.as_str()) {
            return Err(SpecError::Inconsistency {
                at: at.to_string(),
                reason: format!("path parameter '{}' is not in the path template", param.name),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.3",
            "paths": {
                "/pets/{petId}": {
                    "parameters": [
                        {"name": "petId", "in": "path", "required": true, "schema": {"type": "integer", "format": "int64"}}
                    ],
                    "get": {
                        "operationId": "getPet",
                        "parameters": [{"name": "verbose", "in": "query", "schema": {"type": "boolean"}}],
                        "responses": {
                            "200": {"description": "ok", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}},
                            "default": {"description": "error"}
                        }
                    },
                    "delete": {"responses": {"204": {"description": "gone"}}}
                }
            },
            "components": {"schemas": {"Pet": {"type": "object", "properties": {"id": {"type": "integer"}}}}}
        })
    }

    #[test]
    fn test_load_petstore() {
        let set = OperationSet::load(&petstore(), EngineConfig::default()).unwrap();
        assert_eq!(set.len(), 2);

        let get = set.get("getPet").unwrap();
        assert_eq!(get.method, HttpMethod::Get);
        let names: Vec<&str> = get.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["petId", "verbose"]);
        assert!(get.parameter(ParamLocation::Path, "petId").unwrap().required);
        assert_eq!(get.response_for(200).unwrap().key, ResponseKey::Status(200));
        assert_eq!(get.response_for(500).unwrap().key, ResponseKey::Default);
        assert_eq!(set.refs().len(), 1);

        let delete = set.find(HttpMethod::Delete, "/pets/{petId}").unwrap();
        assert_eq!(delete.operation_id, "DELETE /pets/{petId}");
    }

    #[test]
    fn test_operations_share_refs() {
        let set = OperationSet::load(&petstore(), EngineConfig::default()).unwrap();
        let ops: Vec<_> = set.iter().collect();
        assert!(Arc::ptr_eq(&ops[0].refs, &ops[1].refs));
    }

    #[test]
    fn test_version_checked() {
        let mut doc = petstore();
        doc["openapi"] = json!("2.0");
        assert!(matches!(
            OperationSet::load(&doc, EngineConfig::default()),
            Err(SpecError::InvalidDocument(_))
        ));
        doc.as_object_mut().unwrap().remove("openapi");
        assert!(OperationSet::load(&doc, EngineConfig::default()).is_err());
    }

    #[test]
    fn test_duplicate_operation_id() {
        let doc = json!({"openapi": "3.0.0", "paths": {
            "/a": {"get": {"operationId": "same", "responses": {}}},
            "/b": {"get": {"operationId": "same", "responses": {}}}
        }});
        assert!(matches!(
            OperationSet::load(&doc, EngineConfig::default()),
            Err(SpecError::Inconsistency { .. })
        ));
    }

    #[test]
    fn test_path_template_mismatch() {
        let missing = json!({"openapi": "3.0.0", "paths": {"/a/{id}": {"get": {"responses": {}}}}});
        assert!(OperationSet::load(&missing, EngineConfig::default()).is_err());

        let extra = json!({"openapi": "3.0.0", "paths": {"/a": {"get": {
            "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}],
            "responses": {}
        }}}});
        assert!(OperationSet::load(&extra, EngineConfig::default()).is_err());
    }

    #[test]
    fn test_cycle_aborts_whole_set() {
        let doc = json!({"openapi": "3.0.0",
            "paths": {
                "/ok": {"get": {"responses": {"200": {"description": "ok"}}}},
                "/bad": {"get": {"responses": {"200": {"description": "ok",
                    "content": {"application/json": {"schema": {"$ref": "#/components/schemas/A"}}}}}}}
            },
            "components": {"schemas": {
                "A": {"$ref": "#/components/schemas/B"},
                "B": {"$ref": "#/components/schemas/A"}
            }}
        });
        assert!(matches!(
            OperationSet::load(&doc, EngineConfig::default()),
            Err(SpecError::CyclicReference { .. })
        ));
    }

    #[test]
    fn test_shared_path_parameter_warns_once() {
        let doc = json!({"openapi": "3.0.0", "paths": {"/items": {
            "parameters": [{"name": "page", "in": "query", "required": true, "schema": {"type": "integer", "default": 3}}],
            "get": {"operationId": "list", "responses": {}},
            "post": {"operationId": "create", "responses": {}},
            "delete": {"operationId": "clear", "responses": {}}
        }}});
        let set = OperationSet::load(&doc, EngineConfig::default()).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.warnings().len(), 1);
        assert_eq!(set.warnings()[0].at, "#/paths/~1items/parameters/0");
    }

    #[test]
    fn test_warnings_collected() {
        let doc = json!({"openapi": "3.0.0", "paths": {"/a": {"get": {
            "parameters": [{"name": "page", "in": "query", "required": true, "schema": {"type": "integer", "default": 3}}],
            "responses": {}
        }}}});
        let set = OperationSet::load(&doc, EngineConfig::default()).unwrap();
        assert_eq!(set.warnings().len(), 1);
        assert_eq!(
            set.warnings()[0].kind,
            WarningKind::UnobservableDefault {
                parameter: "page".into()
            }
        );
        assert!(OperationSet::load(&doc, EngineConfig::strict()).is_err());
    }
}

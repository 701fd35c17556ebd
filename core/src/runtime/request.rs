#![deny(missing_docs)]

//! # Request Binding
//!
//! [`RawRequest`] carries the undecoded parameter text of one request as the
//! transport saw it. [`OperationModel::deserialize_parameters`] binds it
//! against the operation's parameter contracts.

use crate::error::{CoercionError, ValidationError, ValidationResult};
use crate::oas::descriptor::{PrimitiveKind, TypeShape};
use crate::oas::models::ParamLocation;
use crate::oas::operations::OperationModel;
use crate::oas::resolver::defaults::{explicit_null, omitted};
use crate::oas::resolver::params::{ContentSchema, ParameterSpec};
use crate::runtime::composition::{Direction, Evaluator};
use crate::runtime::deserialize::deserialize;
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Raw parameter text of one request.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    path: HashMap<String, String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    cookies: HashMap<String, String>,
    nulls: Vec<(ParamLocation, String)>,
}

enum Lookup<'r> {
    Missing,
    Null,
    Values(Vec<&'r str>),
}

impl RawRequest {
    /// An empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a path template variable. The value is used as given.
    pub fn with_path(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    /// Appends one decoded query pair. Repeated names keep request order.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Appends every pair of an undecoded query string such as `a=1&b=x%20y`.
    pub fn with_query_string(mut self, query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            self.query.push((decode_component(name), decode_component(value)));
        }
        self
    }

    /// Appends a header. Names match case-insensitively.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Marks a parameter as explicitly null, as a transport does for JSON-backed
    /// adapters that can tell null apart from absence.
    pub fn with_null(mut self, location: ParamLocation, name: impl Into<String>) -> Self {
        self.nulls.push((location, name.into()));
        self
    }

    /// Query parameter names in request order, repeated names included.
    pub fn query_names(&self) -> impl Iterator<Item = &str> {
        self.query.iter().map(|(name, _)| name.as_str())
    }

    fn lookup(&self, spec: &ParameterSpec) -> Lookup<'_> {
        if self
            .nulls
            .iter()
            .any(|(location, name)| *location == spec.location && spec.is_named(name))
        {
            return Lookup::Null;
        }
        let values: Vec<&str> = match spec.location {
            ParamLocation::Path => self.path.get(&spec.name).map(String::as_str).into_iter().collect(),
            ParamLocation::Query => self
                .query
                .iter()
                .filter(|(name, _)| *name == spec.name)
                .map(|(_, value)| value.as_str())
                .collect(),
            ParamLocation::Header => self
                .headers
                .iter()
                .filter(|(name, _)| spec.is_named(name))
                .map(|(_, value)| value.as_str())
                .collect(),
            ParamLocation::Cookie => self
                .cookies
                .get(&spec.name)
                .map(String::as_str)
                .into_iter()
                .collect(),
        };
        if values.is_empty() {
            Lookup::Missing
        } else {
            Lookup::Values(values)
        }
    }
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn is_string(spec: &ParameterSpec) -> bool {
    matches!(
        spec.descriptor.shape,
        TypeShape::Primitive {
            kind: PrimitiveKind::String,
            ..
        }
    )
}

impl OperationModel {
    /// Binds every declared parameter of the request.
    ///
    /// The result is keyed by parameter name in declaration order. Omitted
    /// parameters whose effective default is absent are left out; a null
    /// effective default binds JSON null.
    pub fn deserialize_parameters(
        &self,
        request: &RawRequest,
    ) -> ValidationResult<IndexMap<String, Value>> {
        if self.config.reject_unknown_query_parameters {
            if let Some(unknown) = request
                .query_names()
                .find(|name| self.parameter(ParamLocation::Query, name).is_none())
            {
                return Err(ValidationError::UnexpectedParameter {
                    parameter: unknown.to_string(),
                });
            }
        }

        let mut bound = IndexMap::with_capacity(self.parameters.len());
        for spec in &self.parameters {
            let value = match request.lookup(spec) {
                Lookup::Null => Some(explicit_null(spec)),
                Lookup::Values(values)
                    if spec.allow_empty_value
                        && !is_string(spec)
                        && values.iter().all(|v| v.is_empty()) =>
                {
                    spec.default.to_value().map(Ok)
                }
                Lookup::Values(values) => Some(self.bind(spec, &values)),
                Lookup::Missing => omitted(spec).transpose(),
            };
            match value {
                Some(Ok(value)) => {
                    bound.insert(spec.name.clone(), value);
                }
                Some(Err(error)) => {
                    debug!(
                        operation = %self.operation_id,
                        parameter = %spec.name,
                        location = %spec.location,
                        %error,
                        "parameter rejected"
                    );
                    return Err(error);
                }
                None => {}
            }
        }
        Ok(bound)
    }

    fn bind(&self, spec: &ParameterSpec, values: &[&str]) -> ValidationResult<Value> {
        match &spec.content {
            None => deserialize(&spec.name, values, &spec.descriptor, spec.style, spec.explode),
            Some(content) => {
                let raw = values.first().copied().unwrap_or_default();
                self.bind_content(spec, content, raw)
            }
        }
    }

    fn bind_content(
        &self,
        spec: &ParameterSpec,
        content: &ContentSchema,
        raw: &str,
    ) -> ValidationResult<Value> {
        if !content.media_type.is_json() {
            return Ok(Value::String(raw.to_string()));
        }
        let value: Value = serde_json::from_str(raw).map_err(|e| CoercionError {
            parameter: spec.name.clone(),
            expected: spec.descriptor.clone(),
            raw: raw.to_string(),
            reason: e.to_string(),
        })?;
        if let Some(schema) = &content.schema {
            Evaluator::new(&self.refs, Direction::Request).validate(&value, schema, &spec.name)?;
        }
        Ok(value)
    }
}

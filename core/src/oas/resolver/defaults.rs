#![deny(missing_docs)]

//! # Default/Nullability Reconciliation
//!
//! Combines `default`, `required` and `nullable` into the value a parameter
//! takes when a request omits it, and decides at request time whether absence
//! or an explicit null is legal.

use crate::error::{ValidationError, ValidationResult, WarningKind};
use crate::oas::descriptor::TypeDescriptor;
use crate::oas::models::EffectiveDefault;
use crate::oas::resolver::params::ParameterSpec;
use serde_json::Value;

/// Load-time reconciliation for one parameter.
///
/// | declared            | required | effective default       |
/// |---------------------|----------|-------------------------|
/// | `default: v`        | any      | `v` (warning if required) |
/// | nullable, no default| false    | null                    |
/// | otherwise           | any      | absent                  |
pub fn reconcile(
    name: &str,
    required: bool,
    descriptor: &TypeDescriptor,
) -> (EffectiveDefault, Option<WarningKind>) {
    match &descriptor.default {
        Some(value) => {
            let warning = required.then(|| WarningKind::UnobservableDefault {
                parameter: name.to_string(),
            });
            let effective = if value.is_null() {
                EffectiveDefault::Null
            } else {
                EffectiveDefault::Value(value.clone())
            };
            (effective, warning)
        }
        None if !required && descriptor.nullable => (EffectiveDefault::Null, None),
        None => (EffectiveDefault::Absent, None),
    }
}

/// The value bound for an omitted parameter, `None` when it stays absent.
pub fn omitted(spec: &ParameterSpec) -> ValidationResult<Option<Value>> {
    if spec.required {
        return Err(ValidationError::MissingParameter {
            parameter: spec.name.clone(),
            location: spec.location,
        });
    }
    Ok(spec.default.to_value())
}

/// The value bound for an explicit null.
pub fn explicit_null(spec: &ParameterSpec) -> ValidationResult<Value> {
    if spec.descriptor.nullable {
        Ok(Value::Null)
    } else {
        Err(ValidationError::InvalidNull {
            parameter: spec.name.clone(),
        })
    }
}

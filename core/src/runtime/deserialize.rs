#![deny(missing_docs)]

//! # Parameter Deserializer
//!
//! Converts the raw text of a styled parameter into a typed JSON value, driven
//! only by the parameter's [`TypeDescriptor`], `style` and `explode`.
//!
//! Coercion is strict. `"true"` is never an integer and `"1"` is never a
//! boolean. Union descriptors try their members in declared order and keep
//! the first member that both parses and satisfies its constraints.

use crate::error::{CoercionError, ValidationError, ValidationResult};
use crate::oas::descriptor::{PrimitiveKind, TypeDescriptor, TypeShape};
use crate::oas::models::ParamStyle;
use serde_json::{Number, Value};

const OBJECT_PARAMETER: &str = "object parameters must be declared with `content`";

enum Failure {
    Coerce(String),
    Constraint(ValidationError),
}

/// Deserializes every raw occurrence of one parameter.
///
/// `raw` holds the occurrences in request order. Scalars use the first one.
pub fn deserialize<S: AsRef<str>>(
    name: &str,
    raw: &[S],
    descriptor: &TypeDescriptor,
    style: ParamStyle,
    explode: bool,
) -> ValidationResult<Value> {
    let raw: Vec<&str> = raw.iter().map(AsRef::as_ref).collect();
    let binder = Binder {
        name,
        style,
        explode,
    };
    binder.bind(&raw, descriptor).map_err(|failure| match failure {
        Failure::Coerce(reason) => CoercionError {
            parameter: name.to_string(),
            expected: descriptor.clone(),
            raw: raw.join("&"),
            reason,
        }
        .into(),
        Failure::Constraint(error) => error,
    })
}

struct Binder<'a> {
    name: &'a str,
    style: ParamStyle,
    explode: bool,
}

impl Binder<'_> {
    fn bind(&self, raw: &[&str], descriptor: &TypeDescriptor) -> Result<Value, Failure> {
        let value = match &descriptor.shape {
            TypeShape::Array { element, unique } => {
                let mut items = Vec::new();
                for token in self.split(raw)? {
                    let item = coerce_token(token, element)?;
                    if !(*unique && items.contains(&item)) {
                        items.push(item);
                    }
                }
                Value::Array(items)
            }
            TypeShape::Union { members, .. } => first_success(members, |member| self.bind(raw, member))?,
            _ => {
                let first = raw
                    .first()
                    .ok_or_else(|| Failure::Coerce("no value supplied".into()))?;
                coerce_token(self.strip_scalar(first)?, descriptor)?
            }
        };
        descriptor
            .check(&value, self.name)
            .map_err(Failure::Constraint)?;
        Ok(value)
    }

    fn strip_scalar<'r>(&self, raw: &'r str) -> Result<&'r str, Failure> {
        match self.style {
            ParamStyle::Label => Ok(raw.strip_prefix('.').unwrap_or(raw)),
            ParamStyle::Matrix => self.strip_matrix(raw),
            _ => Ok(raw),
        }
    }

    fn strip_matrix<'r>(&self, segment: &'r str) -> Result<&'r str, Failure> {
        let segment = segment.strip_prefix(';').unwrap_or(segment);
        segment
            .strip_prefix(self.name)
            .and_then(|rest| rest.strip_prefix('='))
            .ok_or_else(|| Failure::Coerce(format!("expected a ';{}=' prefix", self.name)))
    }

    /// Array tokens of every occurrence. Empty occurrences contribute nothing.
    fn split<'r>(&self, raw: &[&'r str]) -> Result<Vec<&'r str>, Failure> {
        let mut tokens = Vec::new();
        for occurrence in raw.iter().copied().filter(|o| !o.is_empty()) {
            match (self.style, self.explode) {
                (ParamStyle::Form, true) => tokens.push(occurrence),
                (ParamStyle::Form, false) | (ParamStyle::Simple, _) => {
                    tokens.extend(occurrence.split(','))
                }
                (ParamStyle::SpaceDelimited, _) => tokens.extend(occurrence.split_whitespace()),
                (ParamStyle::PipeDelimited, _) => tokens.extend(occurrence.split('|')),
                (ParamStyle::Label, explode) => {
                    let body = occurrence.strip_prefix('.').unwrap_or(occurrence);
                    if !body.is_empty() {
                        tokens.extend(body.split(if explode { '.' } else { ',' }));
                    }
                }
                (ParamStyle::Matrix, true) => {
                    for segment in occurrence.split(';').filter(|s| !s.is_empty()) {
                        tokens.push(self.strip_matrix(segment)?);
                    }
                }
                (ParamStyle::Matrix, false) => {
                    let body = self.strip_matrix(occurrence)?;
                    if !body.is_empty() {
                        tokens.extend(body.split(','));
                    }
                }
                (ParamStyle::DeepObject, _) => {
                    return Err(Failure::Coerce("deepObject cannot carry an array".into()))
                }
            }
        }
        Ok(tokens)
    }
}

fn first_success(
    members: &[TypeDescriptor],
    mut attempt: impl FnMut(&TypeDescriptor) -> Result<Value, Failure>,
) -> Result<Value, Failure> {
    members
        .iter()
        .find_map(|member| attempt(member).ok())
        .ok_or_else(|| {
            Failure::Coerce(format!(
                "none of the {} alternatives accepts the value",
                members.len()
            ))
        })
}

fn coerce_token(token: &str, descriptor: &TypeDescriptor) -> Result<Value, Failure> {
    match &descriptor.shape {
        TypeShape::Primitive { kind, .. } => parse_scalar(*kind, token),
        TypeShape::Any => Ok(Value::String(token.to_string())),
        TypeShape::Union { members, .. } => first_success(members, |member| {
            let value = coerce_token(token, member)?;
            member.check(&value, "").map_err(Failure::Constraint)?;
            Ok(value)
        }),
        TypeShape::Array { .. } => Err(Failure::Coerce(
            "nested arrays have no styled representation".into(),
        )),
        TypeShape::Object { .. } => Err(Failure::Coerce(OBJECT_PARAMETER.into())),
    }
}

fn parse_scalar(kind: PrimitiveKind, token: &str) -> Result<Value, Failure> {
    match kind {
        PrimitiveKind::String => Ok(Value::String(token.to_string())),
        PrimitiveKind::Boolean => match token {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(Failure::Coerce(format!("{token:?} is not a boolean"))),
        },
        PrimitiveKind::Integer => {
            if let Ok(int) = token.parse::<i64>() {
                return Ok(Value::from(int));
            }
            match token.parse::<f64>() {
                Ok(float) if float.is_finite() && float.fract() == 0.0 => Ok(integral(float)),
                _ => Err(Failure::Coerce(format!("{token:?} is not an integer"))),
            }
        }
        PrimitiveKind::Number => {
            if let Ok(int) = token.parse::<i64>() {
                return Ok(Value::from(int));
            }
            token
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| Failure::Coerce(format!("{token:?} is not a number")))
        }
    }
}

fn integral(float: f64) -> Value {
    if (-9.2e18..9.2e18).contains(&float) {
        Value::from(float as i64)
    } else {
        Number::from_f64(float).map_or(Value::Null, Value::Number)
    }
}

/// Serializes a value into the raw occurrences `deserialize` reads back.
///
/// Defined for primitive and array descriptors, and unions of them.
pub fn serialize_parameter(
    name: &str,
    value: &Value,
    descriptor: &TypeDescriptor,
    style: ParamStyle,
    explode: bool,
) -> ValidationResult<Vec<String>> {
    descriptor.check(value, name)?;
    let fail = |reason: &str| -> ValidationError {
        CoercionError {
            parameter: name.to_string(),
            expected: descriptor.clone(),
            raw: value.to_string(),
            reason: reason.to_string(),
        }
        .into()
    };

    match (&descriptor.shape, value) {
        (_, Value::Null) => Err(fail("null has no styled representation")),
        (TypeShape::Union { members, .. }, _) => {
            let member = members
                .iter()
                .find(|member| member.accepts(value))
                .ok_or_else(|| fail("no alternative accepts the value"))?;
            serialize_parameter(name, value, member, style, explode)
        }
        (TypeShape::Object { .. }, _) | (_, Value::Object(_)) => Err(fail(OBJECT_PARAMETER)),
        (_, Value::Array(items)) => {
            let mut tokens = Vec::with_capacity(items.len());
            for item in items {
                let token = scalar_text(item).ok_or_else(|| fail("array items must be scalars"))?;
                if token.is_empty() {
                    return Err(fail("empty array items have no styled representation"));
                }
                if token.chars().any(|c| splits_token(style, explode, c)) {
                    return Err(fail(&format!("item {token:?} contains a {style} delimiter")));
                }
                tokens.push(token);
            }
            Ok(match (style, explode) {
                (ParamStyle::Form, true) => tokens,
                (ParamStyle::Form, false) | (ParamStyle::Simple, _) => vec![tokens.join(",")],
                (ParamStyle::SpaceDelimited, _) => vec![tokens.join(" ")],
                (ParamStyle::PipeDelimited, _) => vec![tokens.join("|")],
                (ParamStyle::Label, true) => vec![format!(".{}", tokens.join("."))],
                (ParamStyle::Label, false) => vec![format!(".{}", tokens.join(","))],
                (ParamStyle::Matrix, true) => vec![tokens
                    .iter()
                    .map(|token| format!(";{name}={token}"))
                    .collect::<String>()],
                (ParamStyle::Matrix, false) => vec![format!(";{name}={}", tokens.join(","))],
                (ParamStyle::DeepObject, _) => return Err(fail("deepObject cannot carry an array")),
            })
        }
        (_, scalar) => {
            let text = scalar_text(scalar).ok_or_else(|| fail("unsupported value"))?;
            Ok(vec![match style {
                ParamStyle::Label => format!(".{text}"),
                ParamStyle::Matrix => format!(";{name}={text}"),
                _ => text,
            }])
        }
    }
}

/// Whether `c` would split an array token apart when read back with `style`.
fn splits_token(style: ParamStyle, explode: bool, c: char) -> bool {
    match (style, explode) {
        (ParamStyle::Form, true) => false,
        (ParamStyle::SpaceDelimited, _) => c.is_whitespace(),
        (ParamStyle::PipeDelimited, _) => c == '|',
        (ParamStyle::Label, true) => c == '.',
        (ParamStyle::Matrix, true) => c == ';',
        _ => c == ',',
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(descriptor: &TypeDescriptor, raw: &[&str]) -> ValidationResult<Value> {
        deserialize("p", raw, descriptor, ParamStyle::Form, true)
    }

    #[test]
    fn test_strict_integer() {
        let d = TypeDescriptor::integer().with_nullable(true);
        assert!(matches!(form(&d, &["true"]), Err(ValidationError::Coercion(_))));
        assert_eq!(form(&d, &["42"]).unwrap(), json!(42));
        assert_eq!(form(&d, &["1e3"]).unwrap(), json!(1000));
        assert!(form(&d, &["1.5"]).is_err());
    }

    #[test]
    fn test_strict_boolean() {
        let d = TypeDescriptor::boolean();
        assert_eq!(form(&d, &["false"]).unwrap(), json!(false));
        assert!(form(&d, &["1"]).is_err());
        assert!(form(&d, &["True"]).is_err());
    }

    #[test]
    fn test_number_rejects_non_finite() {
        let d = TypeDescriptor::number();
        assert_eq!(form(&d, &["2.5"]).unwrap(), json!(2.5));
        assert!(form(&d, &["NaN"]).is_err());
        assert!(form(&d, &["inf"]).is_err());
    }

    #[test]
    fn test_union_first_success_in_declared_order() {
        let d = TypeDescriptor::union(vec![TypeDescriptor::string(), TypeDescriptor::boolean()]);
        assert_eq!(form(&d, &["true"]).unwrap(), json!("true"));

        let d = TypeDescriptor::union(vec![TypeDescriptor::boolean(), TypeDescriptor::string()]);
        assert_eq!(form(&d, &["true"]).unwrap(), json!(true));
        assert_eq!(form(&d, &["yes"]).unwrap(), json!("yes"));
    }

    #[test]
    fn test_union_skips_member_failing_constraints() {
        let mut small = TypeDescriptor::integer();
        small.constraints.maximum = Some(10.0);
        let d = TypeDescriptor::union(vec![small, TypeDescriptor::string()]);
        assert_eq!(form(&d, &["5"]).unwrap(), json!(5));
        assert_eq!(form(&d, &["50"]).unwrap(), json!("50"));
    }

    #[test]
    fn test_array_styles() {
        let d = TypeDescriptor::array(TypeDescriptor::integer(), false);
        let cases: [(ParamStyle, bool, &[&str]); 8] = [
            (ParamStyle::Form, true, &["1", "2", "3"]),
            (ParamStyle::Form, false, &["1,2,3"]),
            (ParamStyle::Simple, false, &["1,2,3"]),
            (ParamStyle::SpaceDelimited, false, &["1 2 3"]),
            (ParamStyle::PipeDelimited, false, &["1|2|3"]),
            (ParamStyle::Label, true, &[".1.2.3"]),
            (ParamStyle::Matrix, true, &[";p=1;p=2;p=3"]),
            (ParamStyle::Matrix, false, &[";p=1,2,3"]),
        ];
        for (style, explode, raw) in cases {
            assert_eq!(
                deserialize("p", raw, &d, style, explode).unwrap(),
                json!([1, 2, 3]),
                "{style} explode={explode}"
            );
        }
    }

    #[test]
    fn test_empty_array() {
        let d = TypeDescriptor::array(TypeDescriptor::string(), false);
        assert_eq!(deserialize("p", &[""], &d, ParamStyle::Form, false).unwrap(), json!([]));
    }

    #[test]
    fn test_unique_items_deduplicated() {
        let d = TypeDescriptor::array(TypeDescriptor::string(), true);
        assert_eq!(form(&d, &["a", "b", "a"]).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_constraint_failure_is_schema_error() {
        let mut d = TypeDescriptor::string();
        d.constraints.max_length = Some(3);
        match form(&d, &["toolong"]) {
            Err(ValidationError::Schema { path, .. }) => assert_eq!(path, "p"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_int32_bounds() {
        let d = TypeDescriptor::primitive(PrimitiveKind::Integer, Some("int32"));
        assert!(form(&d, &["2147483647"]).is_ok());
        assert!(form(&d, &["2147483648"]).is_err());
    }

    #[test]
    fn test_object_needs_content() {
        let d = TypeDescriptor::object(Default::default(), Default::default());
        match form(&d, &["a=1"]) {
            Err(ValidationError::Coercion(err)) => assert_eq!(err.reason, OBJECT_PARAMETER),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_label_and_matrix_scalars() {
        let d = TypeDescriptor::integer();
        assert_eq!(deserialize("id", &[".7"], &d, ParamStyle::Label, false).unwrap(), json!(7));
        assert_eq!(deserialize("id", &[";id=7"], &d, ParamStyle::Matrix, false).unwrap(), json!(7));
        assert!(deserialize("id", &[";other=7"], &d, ParamStyle::Matrix, false).is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let d = TypeDescriptor::array(TypeDescriptor::string(), false);
        let value = json!(["a", "b"]);
        for (style, explode) in [
            (ParamStyle::Form, true),
            (ParamStyle::Form, false),
            (ParamStyle::PipeDelimited, false),
            (ParamStyle::Label, true),
            (ParamStyle::Matrix, true),
        ] {
            let raw = serialize_parameter("tags", &value, &d, style, explode).unwrap();
            assert_eq!(deserialize("tags", raw.as_slice(), &d, style, explode).unwrap(), value);
        }
    }

    #[test]
    fn test_serialize_rejects_tokens_that_would_split() {
        let d = TypeDescriptor::array(TypeDescriptor::string(), false);
        let cases = [
            (json!(["a,b"]), ParamStyle::Form, false),
            (json!(["a,b"]), ParamStyle::Simple, false),
            (json!(["x y", "z"]), ParamStyle::SpaceDelimited, false),
            (json!(["p|q"]), ParamStyle::PipeDelimited, false),
            (json!(["v1.2"]), ParamStyle::Label, true),
            (json!(["a;b"]), ParamStyle::Matrix, true),
            (json!([""]), ParamStyle::Form, true),
            (json!(["a", ""]), ParamStyle::Simple, false),
        ];
        for (value, style, explode) in cases {
            match serialize_parameter("tags", &value, &d, style, explode) {
                Err(ValidationError::Coercion(err)) => assert_eq!(err.parameter, "tags"),
                other => panic!("{value} as {style} explode={explode}: unexpected {other:?}"),
            }
        }

        let numbers = TypeDescriptor::array(TypeDescriptor::number(), false);
        assert!(serialize_parameter("n", &json!([1.5]), &numbers, ParamStyle::Label, true).is_err());
        assert_eq!(
            serialize_parameter("n", &json!([1.5]), &numbers, ParamStyle::Label, false).unwrap(),
            vec![".1.5".to_string()]
        );
    }

    #[test]
    fn test_delimiters_of_other_styles_survive() {
        let d = TypeDescriptor::array(TypeDescriptor::string(), false);
        let value = json!(["a,b", "c|d"]);
        let raw = serialize_parameter("tags", &value, &d, ParamStyle::Form, true).unwrap();
        assert_eq!(deserialize("tags", raw.as_slice(), &d, ParamStyle::Form, true).unwrap(), value);

        let value = json!(["a,b", "c.d"]);
        let raw = serialize_parameter("tags", &value, &d, ParamStyle::PipeDelimited, false).unwrap();
        assert_eq!(
            deserialize("tags", raw.as_slice(), &d, ParamStyle::PipeDelimited, false).unwrap(),
            value
        );
    }

    #[test]
    fn test_serialize_rejects_invalid() {
        let d = TypeDescriptor::integer();
        assert!(serialize_parameter("n", &json!("x"), &d, ParamStyle::Form, true).is_err());
        assert!(serialize_parameter("n", &Value::Null, &d.with_nullable(true), ParamStyle::Form, true).is_err());
    }
}

use std::fmt::Display;

use crate::common::Value;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};

/// The storage type of a scalar field.
///
/// This is a closed set: every field a model declares carries exactly one of
/// these kinds, and typecasting dispatches on it at compile time instead of
/// through an open registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// 64-bit signed integer storage
    Integer,
    /// 64-bit float storage
    Float,
    /// Boolean storage
    Boolean,
    /// Text storage
    Text,
}

/// A scalar attribute of a model.
///
/// A field knows how to coerce raw filter input into its typed form
/// (`typecast`), how to render a typed value in storage form (`dump`), and
/// whether a given value is admissible (`validate`). Typecasting is
/// best-effort: it only fails when a value is unrecoverable for the kind,
/// e.g. `"abc"` for an integer field.
///
/// Invariant: `dump(typecast(raw))` is idempotent for values already in
/// storage form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    required: bool,
}

impl Field {
    /// Creates a new optional field with the given name and kind.
    pub fn new(name: &str, kind: FieldKind) -> Field {
        Field {
            name: name.to_string(),
            kind,
            required: false,
        }
    }

    /// Marks the field as required; a null value no longer validates.
    pub fn required(mut self) -> Field {
        self.required = true;
        self
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's storage kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns `true` if the field rejects null values.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Coerces a raw value into the field's typed form.
    ///
    /// Null passes through untouched; admissibility of null is a validity
    /// concern, not a typecast concern. Fails with [ErrorKind::TypecastError]
    /// naming the field when the value cannot be coerced.
    pub fn typecast(&self, raw: Value) -> QuarryResult<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }

        match self.kind {
            FieldKind::Integer => self.cast_integer(raw),
            FieldKind::Float => self.cast_float(raw),
            FieldKind::Boolean => self.cast_boolean(raw),
            FieldKind::Text => self.cast_text(raw),
        }
    }

    /// Renders a typed value in storage form.
    ///
    /// Dumping never fails; values that are already in storage form come
    /// back unchanged.
    pub fn dump(&self, typed: &Value) -> Value {
        match (self.kind, typed) {
            (FieldKind::Integer, Value::I32(v)) => Value::I64(*v as i64),
            (FieldKind::Integer, Value::U64(v)) => match i64::try_from(*v) {
                Ok(v) => Value::I64(v),
                Err(_) => typed.clone(),
            },
            (FieldKind::Float, Value::I32(v)) => Value::F64(*v as f64),
            (FieldKind::Float, Value::I64(v)) => Value::F64(*v as f64),
            (FieldKind::Float, Value::U64(v)) => Value::F64(*v as f64),
            _ => typed.clone(),
        }
    }

    /// Checks whether a typed value is admissible for this field.
    ///
    /// A null value is admissible unless the field is required; a negated
    /// context lifts the requirement (excluding null from a required field
    /// is always satisfiable).
    pub fn validate(&self, value: &Value, negated: bool) -> bool {
        if value.is_null() {
            return !self.required || negated;
        }

        match self.kind {
            FieldKind::Integer => value.as_i64().is_some() || matches!(value, Value::F64(_)),
            FieldKind::Float => value.is_number(),
            FieldKind::Boolean => matches!(value, Value::Bool(_)),
            FieldKind::Text => value.is_string(),
        }
    }

    fn cast_integer(&self, raw: Value) -> QuarryResult<Value> {
        match raw {
            Value::I32(v) => Ok(Value::I64(v as i64)),
            Value::I64(v) => Ok(Value::I64(v)),
            Value::U64(v) => i64::try_from(v)
                .map(Value::I64)
                .map_err(|_| self.typecast_error(&Value::U64(v))),
            Value::F64(v) if v.fract() == 0.0 && v.is_finite() => Ok(Value::I64(v as i64)),
            Value::String(ref s) => match s.trim().parse::<i64>() {
                Ok(v) => Ok(Value::I64(v)),
                Err(_) => Err(self.typecast_error(&raw)),
            },
            other => Err(self.typecast_error(&other)),
        }
    }

    fn cast_float(&self, raw: Value) -> QuarryResult<Value> {
        match raw {
            Value::I32(v) => Ok(Value::F64(v as f64)),
            Value::I64(v) => Ok(Value::F64(v as f64)),
            Value::U64(v) => Ok(Value::F64(v as f64)),
            Value::F64(v) => Ok(Value::F64(v)),
            Value::String(ref s) => match s.trim().parse::<f64>() {
                Ok(v) => Ok(Value::F64(v)),
                Err(_) => Err(self.typecast_error(&raw)),
            },
            other => Err(self.typecast_error(&other)),
        }
    }

    fn cast_boolean(&self, raw: Value) -> QuarryResult<Value> {
        match raw {
            Value::Bool(v) => Ok(Value::Bool(v)),
            Value::I32(0) | Value::I64(0) | Value::U64(0) => Ok(Value::Bool(false)),
            Value::I32(1) | Value::I64(1) | Value::U64(1) => Ok(Value::Bool(true)),
            Value::String(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(self.typecast_error(&raw)),
            },
            other => Err(self.typecast_error(&other)),
        }
    }

    fn cast_text(&self, raw: Value) -> QuarryResult<Value> {
        match raw {
            Value::String(s) => Ok(Value::String(s)),
            Value::Bool(v) => Ok(Value::String(v.to_string())),
            Value::I32(v) => Ok(Value::String(v.to_string())),
            Value::I64(v) => Ok(Value::String(v.to_string())),
            Value::U64(v) => Ok(Value::String(v.to_string())),
            Value::F64(v) => Ok(Value::String(v.to_string())),
            other => Err(self.typecast_error(&other)),
        }
    }

    fn typecast_error(&self, raw: &Value) -> QuarryError {
        log::error!(
            "Cannot typecast {} for field '{}' ({:?})",
            raw,
            self.name,
            self.kind
        );
        QuarryError::new(
            &format!("Cannot typecast {} for field '{}'", raw, self.name),
            ErrorKind::TypecastError,
        )
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_typecast_from_string() {
        let field = Field::new("age", FieldKind::Integer);
        assert_eq!(field.typecast(Value::from("1")).unwrap(), Value::I64(1));
        assert_eq!(field.typecast(Value::from(" 42 ")).unwrap(), Value::I64(42));
    }

    #[test]
    fn test_integer_typecast_unrecoverable() {
        let field = Field::new("age", FieldKind::Integer);
        let err = field.typecast(Value::from("abc")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypecastError);
        assert!(err.message().contains("age"));
    }

    #[test]
    fn test_integer_typecast_from_integral_float() {
        let field = Field::new("age", FieldKind::Integer);
        assert_eq!(field.typecast(Value::F64(3.0)).unwrap(), Value::I64(3));
        assert!(field.typecast(Value::F64(3.5)).is_err());
    }

    #[test]
    fn test_null_passes_through_typecast() {
        let field = Field::new("age", FieldKind::Integer).required();
        assert!(field.typecast(Value::Null).unwrap().is_null());
    }

    #[test]
    fn test_float_typecast() {
        let field = Field::new("score", FieldKind::Float);
        assert_eq!(field.typecast(Value::I32(2)).unwrap(), Value::F64(2.0));
        assert_eq!(
            field.typecast(Value::from("2.5")).unwrap(),
            Value::F64(2.5)
        );
        assert!(field.typecast(Value::Bool(true)).is_err());
    }

    #[test]
    fn test_boolean_typecast() {
        let field = Field::new("active", FieldKind::Boolean);
        assert_eq!(
            field.typecast(Value::from("true")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(field.typecast(Value::I32(0)).unwrap(), Value::Bool(false));
        assert!(field.typecast(Value::from("yes-ish")).is_err());
    }

    #[test]
    fn test_text_typecast() {
        let field = Field::new("name", FieldKind::Text);
        assert_eq!(
            field.typecast(Value::I64(7)).unwrap(),
            Value::String("7".to_string())
        );
        assert!(field.typecast(Value::Array(vec![])).is_err());
    }

    #[test]
    fn test_dump_is_idempotent_on_storage_form() {
        let field = Field::new("age", FieldKind::Integer);
        let typed = field.typecast(Value::from("1")).unwrap();
        let dumped = field.dump(&typed);
        assert_eq!(dumped, Value::I64(1));
        assert_eq!(field.dump(&dumped), dumped);
    }

    #[test]
    fn test_validate_required_and_negation() {
        let field = Field::new("name", FieldKind::Text).required();
        assert!(!field.validate(&Value::Null, false));
        assert!(field.validate(&Value::Null, true));
        assert!(field.validate(&Value::from("x"), false));
        assert!(!field.validate(&Value::I32(1), false));
    }

    #[test]
    fn test_validate_optional_null() {
        let field = Field::new("note", FieldKind::Text);
        assert!(field.validate(&Value::Null, false));
    }
}

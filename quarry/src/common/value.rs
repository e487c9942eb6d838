use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};

use crate::common::Record;

/// Compare two integers represented as i128.
#[inline]
fn num_cmp_int(a: i128, b: i128) -> Ordering {
    a.cmp(&b)
}

/// Compare two floats with proper NaN handling.
///
/// NaN is treated as greater than all other values and equal to itself so
/// that sorting stays total.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Internal numeric view used for cross-width comparison.
#[derive(Clone, Copy)]
enum Num {
    Int(i128),
    Float(f64),
}

/// Represents a typed record value.
///
/// # Purpose
/// Provides a unified representation for all values that flow through the
/// condition algebra: raw filter inputs, typecast values, dumped storage
/// values and record field values.
///
/// # Characteristics
/// - **Comparable**: implements a total order for sorting, with cross-width
///   numeric comparison (`I32(1)` equals `I64(1)`, `F64(1.0)` equals
///   `I64(1)`) and NaN sorted after everything else
/// - **Serializable**: can be serialized/deserialized with serde
/// - **Default**: defaults to `Null`
///
/// # Usage
/// Create values using the `From` trait or the `record!` macro:
/// ```text
/// let v1: Value = 42.into();
/// let v2 = Value::from("hello");
/// let rec = record! { "age" => 42, "name" => "Alice" };
/// ```
#[derive(Clone, Default, serde::Deserialize, serde::Serialize)]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 32-bit integer value.
    I32(i32),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents an unsigned 64-bit integer value.
    U64(u64),
    /// Represents a 64-bit floating point value.
    F64(f64),
    /// Represents a text value.
    String(String),
    /// Represents an ordered collection of values.
    Array(Vec<Value>),
    /// Represents a nested record.
    Record(Record),
}

impl Value {
    /// Returns `true` if the value is [Value::Null].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` if the value is numeric.
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::I32(_) | Value::I64(_) | Value::U64(_) | Value::F64(_)
        )
    }

    /// Returns `true` if the value is a string.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Returns `true` if the value is an array.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Returns the boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as a signed 64-bit integer when it is an integral
    /// number that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the value as a 64-bit float when numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            Value::U64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the array payload, if any.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the nested record payload, if any.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    #[inline]
    fn as_num(&self) -> Option<Num> {
        match self {
            Value::I32(v) => Some(Num::Int(*v as i128)),
            Value::I64(v) => Some(Num::Int(*v as i128)),
            Value::U64(v) => Some(Num::Int(*v as i128)),
            Value::F64(v) => Some(Num::Float(*v)),
            _ => None,
        }
    }

    // Rank used to totally order values of different shapes.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::I32(_) | Value::I64(_) | Value::U64(_) | Value::F64(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Record(_) => 5,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_num(), other.as_num()) {
            (Some(a), Some(b)) => num_cmp(a, b) == Ordering::Equal,
            _ => match (self, other) {
                (Value::Null, Value::Null) => true,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::String(a), Value::String(b)) => a == b,
                (Value::Array(a), Value::Array(b)) => a == b,
                (Value::Record(a), Value::Record(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

#[inline]
fn num_cmp(a: Num, b: Num) -> Ordering {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => num_cmp_int(a, b),
        (Num::Int(a), Num::Float(b)) => num_cmp_float(a as f64, b),
        (Num::Float(a), Num::Int(b)) => num_cmp_float(a, b as f64),
        (Num::Float(a), Num::Float(b)) => num_cmp_float(a, b),
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_num(), other.as_num()) {
            (Some(a), Some(b)) => num_cmp(a, b),
            _ => match (self, other) {
                (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
                (Value::String(a), Value::String(b)) => a.cmp(b),
                (Value::Array(a), Value::Array(b)) => a.cmp(b),
                (Value::Record(a), Value::Record(b)) => a.cmp(b),
                _ => self.type_rank().cmp(&other.type_rank()),
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Record(r) => write!(f, "{}", r),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_width_numeric_equality() {
        assert_eq!(Value::I32(1), Value::I64(1));
        assert_eq!(Value::U64(42), Value::I32(42));
        assert_eq!(Value::F64(1.0), Value::I64(1));
        assert_ne!(Value::F64(1.5), Value::I64(1));
    }

    #[test]
    fn test_nan_is_equal_to_itself() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_eq!(
            Value::F64(f64::NAN).cmp(&Value::F64(1.0)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(Value::I32(1) < Value::I64(2));
        assert!(Value::F64(1.5) < Value::I32(2));
        assert!(Value::U64(10) > Value::F64(9.5));
    }

    #[test]
    fn test_null_sorts_first() {
        assert!(Value::Null < Value::Bool(false));
        assert!(Value::Null < Value::I32(i32::MIN));
        assert!(Value::Null < Value::String(String::new()));
    }

    #[test]
    fn test_type_rank_ordering() {
        assert!(Value::Bool(true) < Value::I32(0));
        assert!(Value::I64(i64::MAX) < Value::String("a".to_string()));
        assert!(Value::String("z".to_string()) < Value::Array(vec![]));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Null), "null");
        assert_eq!(format!("{}", Value::I32(42)), "42");
        assert_eq!(format!("{}", Value::String("x".to_string())), "\"x\"");
        assert_eq!(
            format!("{}", Value::Array(vec![Value::I32(1), Value::I32(2)])),
            "[1, 2]"
        );
    }

    #[test]
    fn test_as_accessors() {
        assert_eq!(Value::I32(5).as_i64(), Some(5));
        assert_eq!(Value::U64(5).as_i64(), Some(5));
        assert_eq!(Value::F64(5.0).as_i64(), None);
        assert_eq!(Value::I32(5).as_f64(), Some(5.0));
        assert_eq!(Value::String("x".to_string()).as_str(), Some("x"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_from_conversions() {
        let v: Value = 42i64.into();
        assert_eq!(v, Value::I64(42));
        let v: Value = "hello".into();
        assert_eq!(v, Value::String("hello".to_string()));
        let v: Value = Option::<i32>::None.into();
        assert!(v.is_null());
        let v: Value = Some(1i32).into();
        assert_eq!(v, Value::I32(1));
    }
}

use std::fmt::Display;

use crate::common::{Record, Value};
use crate::errors::QuarryResult;
use crate::model::{Field, Relationship};

/// What a comparison is evaluated against: a scalar field or a
/// relationship.
///
/// This is a closed tagged union rather than a duck-typed capability set;
/// relationship-specific behavior is reached through [Subject::as_relationship]
/// instead of capability probing.
#[derive(Clone, Debug, PartialEq)]
pub enum Subject {
    /// A scalar attribute of the model.
    Field(Field),
    /// A relationship to another model.
    Relationship(Relationship),
}

impl Subject {
    /// The subject's name.
    pub fn name(&self) -> &str {
        match self {
            Subject::Field(field) => field.name(),
            Subject::Relationship(rel) => rel.name(),
        }
    }

    /// Returns `true` for relationship subjects.
    pub fn is_relationship(&self) -> bool {
        matches!(self, Subject::Relationship(_))
    }

    /// The underlying field, if this is a scalar subject.
    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Subject::Field(field) => Some(field),
            Subject::Relationship(_) => None,
        }
    }

    /// The underlying relationship, if this is a relationship subject.
    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Subject::Field(_) => None,
            Subject::Relationship(rel) => Some(rel),
        }
    }

    /// Coerces a raw value into the subject's typed form.
    ///
    /// Relationship subjects pass values through unchanged; collection
    /// shapes are resolved at the comparison level.
    pub fn typecast(&self, raw: Value) -> QuarryResult<Value> {
        match self {
            Subject::Field(field) => field.typecast(raw),
            Subject::Relationship(_) => Ok(raw),
        }
    }

    /// Renders a typed value in storage form.
    pub fn dump(&self, typed: &Value) -> Value {
        match self {
            Subject::Field(field) => field.dump(typed),
            Subject::Relationship(_) => typed.clone(),
        }
    }

    /// Checks whether a typed value is admissible for the subject.
    pub fn validate(&self, value: &Value, negated: bool) -> bool {
        match self {
            Subject::Field(field) => field.validate(value, negated),
            // key targets of a relationship are opaque here; only null
            // admissibility is decidable
            Subject::Relationship(_) => !value.is_null() || negated,
        }
    }

    /// Extracts the subject's actual value from a record.
    ///
    /// Scalar subjects read their field; relationship subjects read their
    /// source key fields, as a single value for single-field keys and as an
    /// array for compound keys.
    pub fn extract(&self, record: &Record) -> Value {
        match self {
            Subject::Field(field) => record.get(field.name()),
            Subject::Relationship(rel) => {
                let keys = rel.source_key();
                if keys.len() == 1 {
                    record.get(&keys[0])
                } else {
                    Value::Array(keys.iter().map(|k| record.get(k)).collect())
                }
            }
        }
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<Field> for Subject {
    fn from(field: Field) -> Self {
        Subject::Field(field)
    }
}

impl From<Relationship> for Subject {
    fn from(rel: Relationship) -> Self {
        Subject::Relationship(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldKind, Model};
    use crate::record;

    fn order_relationship() -> Relationship {
        let people = Model::builder("people")
            .field(Field::new("id", FieldKind::Integer).required())
            .key(&["id"])
            .build()
            .unwrap();
        let orders = Model::builder("orders")
            .field(Field::new("id", FieldKind::Integer).required())
            .field(Field::new("person_id", FieldKind::Integer))
            .key(&["id"])
            .build()
            .unwrap();
        Relationship::new("orders", people, orders, &["id"], &["person_id"], "person").unwrap()
    }

    #[test]
    fn test_field_subject_typecast_and_extract() {
        let subject = Subject::from(Field::new("age", FieldKind::Integer));
        assert_eq!(subject.typecast(Value::from("1")).unwrap(), Value::I64(1));

        let rec = record! { "age" => 30 };
        assert_eq!(subject.extract(&rec), Value::I32(30));
        assert!(subject.extract(&record! {}).is_null());
    }

    #[test]
    fn test_relationship_subject_passes_typecast_through() {
        let subject = Subject::from(order_relationship());
        let value = Value::Array(vec![Value::I32(1)]);
        assert_eq!(subject.typecast(value.clone()).unwrap(), value);
        assert_eq!(subject.dump(&value), value);
    }

    #[test]
    fn test_relationship_subject_extracts_source_key() {
        let subject = Subject::from(order_relationship());
        let rec = record! { "id" => 7, "name" => "Sam" };
        assert_eq!(subject.extract(&rec), Value::I32(7));
    }

    #[test]
    fn test_subject_accessors() {
        let field_subject = Subject::from(Field::new("age", FieldKind::Integer));
        assert!(!field_subject.is_relationship());
        assert!(field_subject.as_field().is_some());
        assert!(field_subject.as_relationship().is_none());

        let rel_subject = Subject::from(order_relationship());
        assert!(rel_subject.is_relationship());
        assert_eq!(rel_subject.name(), "orders");
    }

    #[test]
    fn test_validate_delegates() {
        let subject = Subject::from(Field::new("name", FieldKind::Text).required());
        assert!(!subject.validate(&Value::Null, false));
        assert!(subject.validate(&Value::Null, true));
    }
}

use crate::common::Value;
use crate::condition::{
    Comparison, ComparisonKind, ConditionOperand, ConditionTree, Operand, OperationKind,
};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::model::{Model, Subject};

/// Translates declarative filter entries into a condition tree rooted at
/// `And`.
///
/// Keys are resolved against the model: a field name becomes a comparison
/// on that field, a relationship name becomes a membership comparison
/// through that relationship. The operator is inferred from the operand
/// shape unless given explicitly via [ConditionBuilder::compare].
///
/// ```ignore
/// let conditions = ConditionBuilder::new(&people)
///     .filter("age", Operand::value(30))?
///     .exclude("name", Operand::value("Sam"))?
///     .build();
/// ```
#[derive(Debug)]
pub struct ConditionBuilder {
    model: Model,
    tree: ConditionTree,
}

impl ConditionBuilder {
    pub fn new(model: &Model) -> ConditionBuilder {
        ConditionBuilder {
            model: model.clone(),
            tree: ConditionTree::new(OperationKind::And),
        }
    }

    /// Adds a positive entry, inferring the operator from the operand:
    /// scalars compare for equality, sets/ranges/collections for inclusion.
    pub fn filter(mut self, key: &str, operand: Operand) -> QuarryResult<ConditionBuilder> {
        let subject = self.resolve(key)?;
        let kind = inferred_kind(&subject, &operand);
        let comparison = Comparison::new(kind, subject, operand)?;
        let root = self.tree.root();
        self.tree
            .append(root, ConditionOperand::Comparison(comparison))?;
        Ok(self)
    }

    /// Adds an entry with an explicit operator.
    pub fn compare(
        mut self,
        key: &str,
        kind: ComparisonKind,
        operand: Operand,
    ) -> QuarryResult<ConditionBuilder> {
        let subject = self.resolve(key)?;
        let comparison = Comparison::new(kind, subject, operand)?;
        let root = self.tree.root();
        self.tree
            .append(root, ConditionOperand::Comparison(comparison))?;
        Ok(self)
    }

    /// Adds a negated entry: the comparison lands under its own `Not`.
    pub fn exclude(mut self, key: &str, operand: Operand) -> QuarryResult<ConditionBuilder> {
        let subject = self.resolve(key)?;
        let kind = inferred_kind(&subject, &operand);
        let comparison = Comparison::new(kind, subject, operand)?;
        let root = self.tree.root();
        let not = self
            .tree
            .append(root, ConditionOperand::Operation(OperationKind::Not))?;
        self.tree
            .append(not, ConditionOperand::Comparison(comparison))?;
        Ok(self)
    }

    /// Adds a raw field/value entry that bypasses the model layer.
    pub fn raw(mut self, expression: &str, value: impl Into<Value>) -> ConditionBuilder {
        let root = self.tree.root();
        // appending a literal to the And root cannot fail
        let _ = self.tree.append(
            root,
            ConditionOperand::Literal(expression.to_string(), value.into()),
        );
        self
    }

    /// The finished tree; a match-all `And` when no entries were added.
    pub fn build(self) -> ConditionTree {
        self.tree
    }

    fn resolve(&self, key: &str) -> QuarryResult<Subject> {
        if let Some(field) = self.model.field(key) {
            return Ok(Subject::Field(field));
        }
        if let Some(relationship) = self.model.relationship(key) {
            return Ok(Subject::Relationship(relationship));
        }
        log::error!(
            "Unknown filter key '{}' on model '{}'",
            key,
            self.model.name()
        );
        Err(QuarryError::new(
            &format!(
                "Unknown filter key '{}' on model '{}'",
                key,
                self.model.name()
            ),
            ErrorKind::InvalidFieldName,
        ))
    }
}

fn inferred_kind(subject: &Subject, operand: &Operand) -> ComparisonKind {
    if subject.is_relationship() {
        return ComparisonKind::Inclusion;
    }
    match operand {
        Operand::Single(Value::Array(_)) => ComparisonKind::Inclusion,
        Operand::Single(_) => ComparisonKind::Equal,
        Operand::Set(_) | Operand::Bound(_) | Operand::Query(_) => ComparisonKind::Inclusion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Bound;
    use crate::model::{Field, FieldKind};
    use crate::record;

    fn people() -> Model {
        Model::builder("people")
            .field(Field::new("id", FieldKind::Integer).required())
            .field(Field::new("name", FieldKind::Text))
            .field(Field::new("age", FieldKind::Integer))
            .key(&["id"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_builder_is_match_all() {
        let tree = ConditionBuilder::new(&people()).build();
        assert!(tree.is_match_all());
        assert!(tree.matches(&record! { "id" => 1 }).unwrap());
    }

    #[test]
    fn test_scalar_infers_equality() {
        let tree = ConditionBuilder::new(&people())
            .filter("age", Operand::value(30))
            .unwrap()
            .build();
        assert_eq!(format!("{}", tree), "age = 30");
        assert!(tree.matches(&record! { "age" => 30 }).unwrap());
        assert!(!tree.matches(&record! { "age" => 31 }).unwrap());
    }

    #[test]
    fn test_set_and_bound_infer_inclusion() {
        let tree = ConditionBuilder::new(&people())
            .filter("age", Operand::Set(vec![Value::I32(1), Value::I32(2)]))
            .unwrap()
            .build();
        assert!(tree.matches(&record! { "age" => 2 }).unwrap());
        assert!(!tree.matches(&record! { "age" => 3 }).unwrap());

        let tree = ConditionBuilder::new(&people())
            .filter("age", Operand::Bound(Bound::inclusive(18, 65)))
            .unwrap()
            .build();
        assert!(tree.matches(&record! { "age" => 18 }).unwrap());
        assert!(!tree.matches(&record! { "age" => 17 }).unwrap());
    }

    #[test]
    fn test_explicit_operator() {
        let tree = ConditionBuilder::new(&people())
            .compare("age", ComparisonKind::GreaterOrEqual, Operand::value(18))
            .unwrap()
            .build();
        assert!(tree.matches(&record! { "age" => 18 }).unwrap());
        assert!(!tree.matches(&record! { "age" => 17 }).unwrap());
    }

    #[test]
    fn test_exclude_negates() {
        let tree = ConditionBuilder::new(&people())
            .exclude("name", Operand::value("Sam"))
            .unwrap()
            .build();
        assert_eq!(format!("{}", tree), "NOT(name = \"Sam\")");
        assert!(!tree.matches(&record! { "name" => "Sam" }).unwrap());
        assert!(tree.matches(&record! { "name" => "Dan" }).unwrap());
        assert!(tree.matches(&record! {}).unwrap());
    }

    #[test]
    fn test_entries_conjoin() {
        let tree = ConditionBuilder::new(&people())
            .filter("age", Operand::value(30))
            .unwrap()
            .exclude("name", Operand::value("Sam"))
            .unwrap()
            .build();
        assert!(tree.matches(&record! { "age" => 30, "name" => "Dan" }).unwrap());
        assert!(!tree.matches(&record! { "age" => 30, "name" => "Sam" }).unwrap());
        assert!(!tree.matches(&record! { "age" => 31, "name" => "Dan" }).unwrap());
    }

    #[test]
    fn test_unknown_key_names_the_key() {
        let err = ConditionBuilder::new(&people())
            .filter("colour", Operand::value(1))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFieldName);
        assert!(err.message().contains("colour"));
        assert!(err.message().contains("people"));
    }

    #[test]
    fn test_typecast_runs_through_the_model() {
        let err = ConditionBuilder::new(&people())
            .filter("age", Operand::value("abc"))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypecastError);
    }

    #[test]
    fn test_raw_bypasses_the_model() {
        let tree = ConditionBuilder::new(&people())
            .raw("legacy_flag", true)
            .build();
        assert!(tree.matches(&record! { "legacy_flag" => true }).unwrap());
        assert!(!tree.matches(&record! { "legacy_flag" => false }).unwrap());
    }

    #[test]
    fn test_relationship_key_resolves() {
        let source = people();
        let target = Model::builder("orders")
            .field(Field::new("id", FieldKind::Integer).required())
            .field(Field::new("person_id", FieldKind::Integer))
            .key(&["id"])
            .build()
            .unwrap();
        source
            .has_many("orders", &target, &["id"], &["person_id"], "person")
            .unwrap();

        let order = record! { "id" => 5, "person_id" => 3 };
        let tree = ConditionBuilder::new(&source)
            .filter("orders", Operand::value(Value::Record(order)))
            .unwrap()
            .build();
        assert!(tree.matches(&record! { "id" => 3 }).unwrap());
        assert!(!tree.matches(&record! { "id" => 4 }).unwrap());
    }
}

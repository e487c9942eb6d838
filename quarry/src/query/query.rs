use std::fmt::Display;

use itertools::Itertools;

use crate::common::SortOrder;
use crate::condition::{ConditionOperand, ConditionTree};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::model::{Model, Relationship};

/// A backend-agnostic description of "which records of this model, in what
/// order, in which window".
///
/// A query is a plain value: composition (`update`, `merge`, `relative`,
/// the set algebra) either mutates the receiver in place or returns a new
/// query, and never touches a store. The invariant `offset > 0 => limit`
/// is enforced on every composition path.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    model: Model,
    fields: Vec<String>,
    links: Vec<Relationship>,
    conditions: Option<ConditionTree>,
    offset: u64,
    limit: Option<u64>,
    order: Vec<(String, SortOrder)>,
    unique: bool,
    add_reversed: bool,
    reload: bool,
}

impl Query {
    /// A query over every record of the model: full projection, no
    /// conditions, no window, ordered by the model key ascending.
    pub fn new(model: Model) -> Query {
        let fields = model.field_names();
        let order = model
            .key()
            .iter()
            .map(|k| (k.clone(), SortOrder::Ascending))
            .collect();
        Query {
            model,
            fields,
            links: Vec::new(),
            conditions: None,
            offset: 0,
            limit: None,
            order,
            unique: false,
            add_reversed: false,
            reload: false,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn links(&self) -> &[Relationship] {
        &self.links
    }

    pub fn conditions(&self) -> Option<&ConditionTree> {
        self.conditions.as_ref()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn order(&self) -> &[(String, SortOrder)] {
        &self.order
    }

    pub fn unique(&self) -> bool {
        self.unique
    }

    pub fn add_reversed(&self) -> bool {
        self.add_reversed
    }

    pub fn reload(&self) -> bool {
        self.reload
    }

    /// Replaces the projection.
    pub fn with_fields(mut self, fields: &[String]) -> Query {
        self.fields = fields.to_vec();
        self
    }

    /// Applies an option set in place.
    ///
    /// Options that are present override the query's current state, except
    /// conditions, which are And-composed with the existing tree.
    pub fn update(&mut self, options: QueryOptions) -> QuarryResult<()> {
        if let Some(tree) = options.conditions {
            self.and_conditions(tree)?;
        }
        if let Some(fields) = options.fields {
            self.fields = fields;
        }
        if let Some(links) = options.links {
            for link in links {
                self.add_link(link);
            }
        }
        if let Some(offset) = options.offset {
            self.offset = offset;
        }
        if let Some(limit) = options.limit {
            self.limit = Some(limit);
        }
        if let Some(order) = options.order {
            self.order = order;
        }
        if let Some(unique) = options.unique {
            self.unique = unique;
        }
        if let Some(add_reversed) = options.add_reversed {
            self.add_reversed = add_reversed;
        }
        if let Some(reload) = options.reload {
            self.reload = reload;
        }
        self.check_window()
    }

    /// Merges another query of the same model into this one.
    ///
    /// The other query's conditions are And-flattened into the receiver's;
    /// every non-condition field is overridden by the other's and links are
    /// unioned.
    pub fn merge(&mut self, other: &Query) -> QuarryResult<()> {
        self.check_model(other)?;

        if let Some(tree) = &other.conditions {
            self.and_conditions(tree.clone())?;
        }
        self.fields = other.fields.clone();
        for link in &other.links {
            self.add_link(link.clone());
        }
        self.offset = other.offset;
        self.limit = other.limit;
        self.order = other.order.clone();
        self.unique = other.unique;
        self.add_reversed = other.add_reversed;
        self.reload = other.reload;
        self.check_window()
    }

    /// A copy with the option set applied relatively: the offset is added
    /// to the current one and the limit is clipped to the window the query
    /// already addresses.
    ///
    /// Compositions that step outside the current window fail with
    /// [ErrorKind::RangeError] naming the computed offset/limit pair.
    pub fn relative(&self, options: QueryOptions) -> QuarryResult<Query> {
        let added = options.offset.unwrap_or(0);
        let offset = self.offset + added;

        let limit = match (self.limit, options.limit) {
            (None, requested) => requested,
            (Some(current), requested) => {
                if added > current {
                    return Err(window_error(offset, requested));
                }
                let remaining = current - added;
                Some(match requested {
                    Some(len) => len.min(remaining),
                    None => remaining,
                })
            }
        };

        let mut sliced = self.clone();
        if let Some(tree) = options.conditions {
            sliced.and_conditions(tree)?;
        }
        if let Some(fields) = options.fields {
            sliced.fields = fields;
        }
        if let Some(links) = options.links {
            for link in links {
                sliced.add_link(link);
            }
        }
        if let Some(order) = options.order {
            sliced.order = order;
        }
        if let Some(unique) = options.unique {
            sliced.unique = unique;
        }
        if let Some(add_reversed) = options.add_reversed {
            sliced.add_reversed = add_reversed;
        }
        if let Some(reload) = options.reload {
            sliced.reload = reload;
        }
        sliced.offset = offset;
        sliced.limit = limit;
        sliced.check_window().map_err(|_| window_error(offset, limit))?;
        Ok(sliced)
    }

    /// A window of `length` records starting `offset` into this query.
    pub fn slice(&self, offset: u64, length: u64) -> QuarryResult<Query> {
        self.relative(QueryOptions::new().offset(offset).limit(length))
    }

    /// A one-record window at `offset`.
    pub fn slice_one(&self, offset: u64) -> QuarryResult<Query> {
        self.slice(offset, 1)
    }

    /// A copy with the overall direction flipped: every order entry is
    /// reversed and `add_reversed` is toggled.
    pub fn reverse(&self) -> Query {
        let mut reversed = self.clone();
        reversed.add_reversed = !reversed.add_reversed;
        for (_, order) in &mut reversed.order {
            *order = order.reversed();
        }
        reversed
    }

    pub(crate) fn check_model(&self, other: &Query) -> QuarryResult<()> {
        if self.model != other.model {
            log::error!(
                "Cannot combine queries over '{}' and '{}'",
                self.model.name(),
                other.model.name()
            );
            return Err(QuarryError::new(
                &format!(
                    "Cannot combine queries over '{}' and '{}'",
                    self.model.name(),
                    other.model.name()
                ),
                ErrorKind::ModelMismatch,
            ));
        }
        Ok(())
    }

    pub(crate) fn set_conditions(&mut self, conditions: Option<ConditionTree>) {
        self.conditions = conditions;
    }

    pub(crate) fn clear_window(&mut self) {
        self.offset = 0;
        self.limit = None;
        self.links.clear();
    }

    fn and_conditions(&mut self, tree: ConditionTree) -> QuarryResult<()> {
        match &mut self.conditions {
            Some(existing) => {
                let root = existing.root();
                existing.append(root, ConditionOperand::Tree(tree))?;
            }
            None => self.conditions = Some(tree),
        }
        Ok(())
    }

    fn add_link(&mut self, link: Relationship) {
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }

    fn check_window(&self) -> QuarryResult<()> {
        if self.offset > 0 && self.limit.is_none() {
            return Err(QuarryError::new(
                &format!("Offset {} requires a limit", self.offset),
                ErrorKind::ValidationError,
            ));
        }
        Ok(())
    }
}

fn window_error(offset: u64, limit: Option<u64>) -> QuarryError {
    let rendered = match limit {
        Some(limit) => format!("(offset {}, limit {})", offset, limit),
        None => format!("(offset {}, no limit)", offset),
    };
    log::error!("Window {} is outside the addressable range", rendered);
    QuarryError::new(
        &format!("Window {} is outside the addressable range", rendered),
        ErrorKind::RangeError,
    )
}

impl Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "query on {}", self.model.name())?;
        if let Some(conditions) = &self.conditions {
            write!(f, " where {}", conditions)?;
        }
        if !self.order.is_empty() {
            let rendered = self
                .order
                .iter()
                .map(|(field, order)| format!("{} {:?}", field, order))
                .join(", ");
            write!(f, " order by {}", rendered)?;
        }
        if self.offset > 0 || self.limit.is_some() {
            write!(f, " window (offset {}, limit {:?})", self.offset, self.limit)?;
        }
        Ok(())
    }
}

/// Option set for [Query::update], [Query::merge] style composition.
///
/// Unset entries leave the query untouched.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    pub(crate) conditions: Option<ConditionTree>,
    pub(crate) fields: Option<Vec<String>>,
    pub(crate) links: Option<Vec<Relationship>>,
    pub(crate) offset: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) order: Option<Vec<(String, SortOrder)>>,
    pub(crate) unique: Option<bool>,
    pub(crate) add_reversed: Option<bool>,
    pub(crate) reload: Option<bool>,
}

impl QueryOptions {
    pub fn new() -> QueryOptions {
        QueryOptions::default()
    }

    pub fn conditions(mut self, conditions: ConditionTree) -> QueryOptions {
        self.conditions = Some(conditions);
        self
    }

    pub fn fields(mut self, fields: &[&str]) -> QueryOptions {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn link(mut self, relationship: Relationship) -> QueryOptions {
        self.links.get_or_insert_with(Vec::new).push(relationship);
        self
    }

    pub fn offset(mut self, offset: u64) -> QueryOptions {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> QueryOptions {
        self.limit = Some(limit);
        self
    }

    pub fn order_by(mut self, field: &str, order: SortOrder) -> QueryOptions {
        self.order
            .get_or_insert_with(Vec::new)
            .push((field.to_string(), order));
        self
    }

    pub fn unique(mut self, unique: bool) -> QueryOptions {
        self.unique = Some(unique);
        self
    }

    pub fn add_reversed(mut self, add_reversed: bool) -> QueryOptions {
        self.add_reversed = Some(add_reversed);
        self
    }

    pub fn reload(mut self, reload: bool) -> QueryOptions {
        self.reload = Some(reload);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionBuilder, Operand};
    use crate::model::{Field, FieldKind, Relationship};

    fn people() -> Model {
        Model::builder("people")
            .field(Field::new("id", FieldKind::Integer).required())
            .field(Field::new("name", FieldKind::Text))
            .field(Field::new("age", FieldKind::Integer))
            .key(&["id"])
            .build()
            .unwrap()
    }

    fn adults(model: &Model) -> ConditionTree {
        ConditionBuilder::new(model)
            .compare(
                "age",
                crate::condition::ComparisonKind::GreaterOrEqual,
                Operand::value(18),
            )
            .unwrap()
            .build()
    }

    #[test]
    fn test_new_defaults() {
        let model = people();
        let query = Query::new(model.clone());
        assert_eq!(query.fields(), &["id", "name", "age"]);
        assert!(query.conditions().is_none());
        assert_eq!(query.offset(), 0);
        assert_eq!(query.limit(), None);
        assert_eq!(query.order(), &[("id".to_string(), SortOrder::Ascending)]);
        assert!(!query.unique());
        assert!(!query.add_reversed());
        assert!(!query.reload());
    }

    #[test]
    fn test_update_overrides_and_composes_conditions() {
        let model = people();
        let mut query = Query::new(model.clone());
        query
            .update(
                QueryOptions::new()
                    .conditions(adults(&model))
                    .offset(10)
                    .limit(5)
                    .unique(true),
            )
            .unwrap();
        assert_eq!(query.offset(), 10);
        assert_eq!(query.limit(), Some(5));
        assert!(query.unique());
        assert!(query.conditions().is_some());

        // a second condition set lands under the same And root
        let named = ConditionBuilder::new(&model)
            .filter("name", Operand::value("Sam"))
            .unwrap()
            .build();
        query.update(QueryOptions::new().conditions(named)).unwrap();
        let tree = query.conditions().unwrap();
        assert_eq!(tree.children(tree.root()).len(), 2);
    }

    #[test]
    fn test_offset_requires_limit() {
        let model = people();
        let mut query = Query::new(model);
        let err = query.update(QueryOptions::new().offset(3)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_merge_requires_same_model() {
        let other_model = Model::builder("orders")
            .field(Field::new("id", FieldKind::Integer))
            .key(&["id"])
            .build()
            .unwrap();
        let mut query = Query::new(people());
        let err = query.merge(&Query::new(other_model)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ModelMismatch);
    }

    #[test]
    fn test_merge_composes_conditions_and_overrides_rest() {
        let model = people();
        let mut left = Query::new(model.clone());
        left.update(QueryOptions::new().conditions(adults(&model)))
            .unwrap();

        let mut right = Query::new(model.clone());
        right
            .update(
                QueryOptions::new()
                    .conditions(
                        ConditionBuilder::new(&model)
                            .filter("name", Operand::value("Sam"))
                            .unwrap()
                            .build(),
                    )
                    .offset(2)
                    .limit(4)
                    .order_by("age", SortOrder::Descending),
            )
            .unwrap();

        left.merge(&right).unwrap();
        let tree = left.conditions().unwrap();
        assert_eq!(tree.children(tree.root()).len(), 2);
        assert_eq!(left.offset(), 2);
        assert_eq!(left.limit(), Some(4));
        assert_eq!(left.order(), &[("age".to_string(), SortOrder::Descending)]);
    }

    #[test]
    fn test_relative_offset_is_additive() {
        let query = Query::new(people()).slice(10, 20).unwrap();
        let inner = query.slice(5, 10).unwrap();
        assert_eq!(inner.offset(), 15);
        assert_eq!(inner.limit(), Some(10));
    }

    #[test]
    fn test_relative_limit_clips_to_window() {
        let query = Query::new(people()).slice(0, 10).unwrap();
        let inner = query.slice(6, 100).unwrap();
        assert_eq!(inner.offset(), 6);
        assert_eq!(inner.limit(), Some(4));
    }

    #[test]
    fn test_relative_outside_window_is_a_range_error() {
        let query = Query::new(people()).slice(0, 10).unwrap();
        let err = query.slice(11, 1).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::RangeError);
        assert!(err.message().contains("offset 11"));
    }

    #[test]
    fn test_relative_applies_links() {
        let model = people();
        let orders = Model::builder("orders")
            .field(Field::new("id", FieldKind::Integer).required())
            .field(Field::new("person_id", FieldKind::Integer))
            .key(&["id"])
            .build()
            .unwrap();
        let rel = Relationship::new(
            "orders",
            model.clone(),
            orders,
            &["id"],
            &["person_id"],
            "person",
        )
        .unwrap();

        let sliced = Query::new(model)
            .relative(QueryOptions::new().limit(5).link(rel.clone()))
            .unwrap();
        assert_eq!(sliced.links(), &[rel.clone()]);

        // linking the same relationship again keeps one entry
        let again = sliced
            .relative(QueryOptions::new().link(rel.clone()))
            .unwrap();
        assert_eq!(again.links(), &[rel]);
    }

    #[test]
    fn test_slice_one() {
        let query = Query::new(people()).slice_one(3).unwrap();
        assert_eq!(query.offset(), 3);
        assert_eq!(query.limit(), Some(1));
    }

    #[test]
    fn test_reverse_flips_order_and_flag() {
        let query = Query::new(people());
        let reversed = query.reverse();
        assert!(reversed.add_reversed());
        assert_eq!(
            reversed.order(),
            &[("id".to_string(), SortOrder::Descending)]
        );
        // reversing twice restores the original
        assert_eq!(reversed.reverse(), query);
    }

    #[test]
    fn test_display() {
        let model = people();
        let mut query = Query::new(model.clone());
        query
            .update(QueryOptions::new().conditions(adults(&model)).limit(5))
            .unwrap();
        let rendered = format!("{}", query);
        assert!(rendered.contains("query on people"));
        assert!(rendered.contains("age >= 18"));
        assert!(rendered.contains("limit"));
    }
}

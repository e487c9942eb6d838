use crate::condition::{
    Comparison, ComparisonKind, ConditionOperand, ConditionTree, Operand, OperationKind,
};
use crate::errors::QuarryResult;
use crate::model::{Relationship, Subject};
use crate::query::Query;

/// Set algebra over queries of the same model.
///
/// Every operation is pure: both inputs stay untouched and the result is a
/// fresh query. A side whose window and links are trivial contributes its
/// plain condition tree; a paginated or joined side cannot, so it is
/// wrapped into a membership test through the model's self-referential
/// relationship, with the side re-projected onto the key fields.
impl Query {
    /// Records matched by either query.
    pub fn union(&self, other: &Query) -> QuarryResult<Query> {
        self.check_model(other)?;
        let left = self.contribution()?;
        let right = other.contribution()?;

        let conditions = match (left, right) {
            // an unconstrained side swallows the union
            (None, _) | (_, None) => None,
            (Some(a), Some(b)) => {
                let mut tree = ConditionTree::new(OperationKind::And);
                let root = tree.root();
                let or = tree.append(root, ConditionOperand::Operation(OperationKind::Or))?;
                tree.append(or, ConditionOperand::Tree(a))?;
                tree.append(or, ConditionOperand::Tree(b))?;
                Some(tree.minimized())
            }
        };

        Ok(self.combined(other, conditions))
    }

    /// Records matched by both queries.
    pub fn intersection(&self, other: &Query) -> QuarryResult<Query> {
        self.check_model(other)?;
        let left = self.contribution()?;
        let right = other.contribution()?;

        let conditions = match (left, right) {
            (None, None) => None,
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (Some(a), Some(b)) => {
                let mut tree = a;
                let root = tree.root();
                tree.append(root, ConditionOperand::Tree(b))?;
                Some(tree.minimized())
            }
        };

        Ok(self.combined(other, conditions))
    }

    /// Records matched by this query but not the other.
    ///
    /// Subtracting an unconstrained query leaves nothing: the result is the
    /// match-none tree.
    pub fn difference(&self, other: &Query) -> QuarryResult<Query> {
        self.check_model(other)?;
        let left = self.contribution()?;
        let right = other.contribution()?;

        let mut tree = ConditionTree::new(OperationKind::And);
        let root = tree.root();
        if let Some(a) = left {
            tree.append(root, ConditionOperand::Tree(a))?;
        }
        let not = tree.append(root, ConditionOperand::Operation(OperationKind::Not))?;
        match right {
            Some(b) => {
                tree.append(not, ConditionOperand::Tree(b))?;
            }
            None => {
                tree.append(not, ConditionOperand::Operation(OperationKind::Null))?;
            }
        }

        Ok(self.combined(other, Some(tree.minimized())))
    }

    /// This side's condition contribution; `None` means match-all.
    ///
    /// A side is directly foldable only when its window is the whole result
    /// set and it joins nothing; otherwise folding its conditions would
    /// silently widen it, so the side is wrapped instead.
    fn contribution(&self) -> QuarryResult<Option<ConditionTree>> {
        if self.offset() == 0 && self.limit().is_none() && self.links().is_empty() {
            Ok(self
                .conditions()
                .map(|tree| tree.minimized())
                .filter(|tree| !tree.is_match_all()))
        } else {
            Ok(Some(self.wrapped()?))
        }
    }

    /// Turns the whole query into one membership comparison: the record's
    /// primary key must appear in this query re-projected onto the key
    /// fields.
    fn wrapped(&self) -> QuarryResult<ConditionTree> {
        let relationship = Relationship::self_referential(self.model())?;
        let projected = self.clone().with_fields(self.model().key());
        let comparison = Comparison::new(
            ComparisonKind::Inclusion,
            Subject::Relationship(relationship),
            Operand::query(projected),
        )?;
        Ok(ConditionTree::from_comparison(comparison))
    }

    // The result skeleton: right-hand side's non-condition fields, window
    // and links cleared.
    fn combined(&self, other: &Query, conditions: Option<ConditionTree>) -> Query {
        let mut result = other.clone();
        result.clear_window();
        result.set_conditions(conditions);
        result
    }
}

use std::cmp::Ordering;

use crate::common::{Record, SortOrder};
use crate::errors::QuarryResult;
use crate::query::Query;

/// The in-memory record pipeline: filter, then sort, then window.
///
/// The phases are strictly sequential and each one is available on its own
/// so a caller holding a pre-filtered or pre-sorted batch can skip ahead.
impl Query {
    /// Keeps the records matching the query's conditions, preserving input
    /// order. With `unique` set, later duplicates are dropped.
    pub fn filter_records(&self, records: &[Record]) -> QuarryResult<Vec<Record>> {
        let mut out: Vec<Record> = Vec::new();
        for record in records {
            let keep = match self.conditions() {
                Some(tree) => tree.matches(record)?,
                None => true,
            };
            if keep && (!self.unique() || !out.contains(record)) {
                out.push(record.clone());
            }
        }
        Ok(out)
    }

    /// Stable multi-key sort by the query's order entries. Null sorts
    /// first; `add_reversed` inverts the whole ordering.
    pub fn sort_records(&self, mut records: Vec<Record>) -> Vec<Record> {
        if !self.order().is_empty() {
            records.sort_by(|a, b| self.compare_records(a, b));
        }
        records
    }

    /// Applies the offset/limit window.
    pub fn limit_records(&self, records: Vec<Record>) -> Vec<Record> {
        let skipped = records.into_iter().skip(self.offset() as usize);
        match self.limit() {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        }
    }

    /// The full pipeline: filter, sort, window.
    pub fn match_records(&self, records: &[Record]) -> QuarryResult<Vec<Record>> {
        let filtered = self.filter_records(records)?;
        let sorted = self.sort_records(filtered);
        Ok(self.limit_records(sorted))
    }

    fn compare_records(&self, a: &Record, b: &Record) -> Ordering {
        let mut ordering = Ordering::Equal;
        for (field, order) in self.order() {
            let result = a.get(field).cmp(&b.get(field));
            let result = match order {
                SortOrder::Ascending => result,
                SortOrder::Descending => result.reverse(),
            };
            if result != Ordering::Equal {
                ordering = result;
                break;
            }
        }
        if self.add_reversed() {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};

use indexmap::IndexMap;

use crate::common::Value;

/// An in-memory record: an insertion-ordered, string-keyed mapping of
/// field values.
///
/// `Record` is the shape the condition algebra evaluates against. A missing
/// field reads as [Value::Null] so that absence and null are
/// indistinguishable to comparisons, which is what the matching rules
/// expect.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::record;
///
/// let rec = record! { "name" => "Alice", "age" => 30 };
/// assert_eq!(rec.get("name").as_str(), Some("Alice"));
/// assert!(rec.get("missing").is_null());
/// ```
#[derive(Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct Record {
    inner: IndexMap<String, Value>,
}

impl Record {
    /// Creates a new empty record.
    pub fn new() -> Record {
        Record {
            inner: IndexMap::new(),
        }
    }

    /// Sets a field value, replacing any previous value for the key.
    pub fn put(&mut self, key: &str, value: impl Into<Value>) -> &mut Record {
        self.inner.insert(key.to_string(), value.into());
        self
    }

    /// Gets a field value.
    ///
    /// Returns [Value::Null] when the field is absent.
    pub fn get(&self, key: &str) -> Value {
        self.inner.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Returns `true` if the record holds the given field.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the number of fields in the record.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }

    /// Returns a copy keeping only the named fields, in the given order.
    pub fn project(&self, keys: &[String]) -> Record {
        let mut projected = Record::new();
        for key in keys {
            if let Some(value) = self.inner.get(key) {
                projected.put(key, value.clone());
            }
        }
        projected
    }

    // Key-sorted view, so equality and ordering ignore insertion order.
    fn sorted_pairs(&self) -> Vec<(&String, &Value)> {
        let mut pairs: Vec<_> = self.inner.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_pairs() == other.sorted_pairs()
    }
}

impl Eq for Record {}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted_pairs().cmp(&other.sorted_pairs())
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.inner.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

/// Builds a [Record] from `key => value` pairs.
///
/// ```rust,ignore
/// let rec = record! { "name" => "John", "age" => 42 };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::common::Record::new()
    };
    ( $( $key:expr => $value:expr ),* $(,)? ) => {{
        let mut rec = $crate::common::Record::new();
        $( rec.put($key, $crate::common::Value::from($value)); )*
        rec
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let mut rec = Record::new();
        rec.put("name", "Alice").put("age", 30);
        assert_eq!(rec.get("name"), Value::String("Alice".to_string()));
        assert_eq!(rec.get("age"), Value::I32(30));
    }

    #[test]
    fn test_missing_field_reads_as_null() {
        let rec = Record::new();
        assert!(rec.get("missing").is_null());
        assert!(!rec.contains("missing"));
    }

    #[test]
    fn test_record_macro() {
        let rec = record! { "name" => "John", "age" => 42 };
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.get("name").as_str(), Some("John"));
        assert_eq!(rec.get("age").as_i64(), Some(42));

        let empty = record! {};
        assert!(empty.is_empty());
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let a = record! { "x" => 1, "y" => 2 };
        let b = record! { "y" => 2, "x" => 1 };
        assert_eq!(a, b);
    }

    #[test]
    fn test_put_replaces_value() {
        let mut rec = record! { "x" => 1 };
        rec.put("x", 2);
        assert_eq!(rec.get("x").as_i64(), Some(2));
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_project() {
        let rec = record! { "id" => 1, "name" => "Sam", "age" => 20 };
        let projected = rec.project(&["id".to_string(), "missing".to_string()]);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("id").as_i64(), Some(1));
    }

    #[test]
    fn test_display() {
        let rec = record! { "a" => 1 };
        assert_eq!(format!("{}", rec), "{a: 1}");
    }

    #[test]
    fn test_ordering_is_consistent_with_equality() {
        let a = record! { "x" => 1 };
        let b = record! { "x" => 2 };
        assert!(a < b);
        let c = record! { "x" => 1 };
        assert_eq!(a.cmp(&c), std::cmp::Ordering::Equal);
    }
}

use std::fmt::{Debug, Display};
use std::sync::{Arc, OnceLock};

use itertools::Itertools;
use regex::Regex;

use crate::common::{Record, Value};
use crate::condition::{ConditionOperand, ConditionTree, OperationKind};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::model::Subject;
use crate::query::Query;

/// The operator of a comparison leaf.
///
/// This is a closed set registered at compile time; dispatch is a match on
/// the kind, and exhaustiveness is checked by the compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonKind {
    /// `subject = value` (null expected matches only null extracted)
    Equal,
    /// `subject IN set/range/collection`
    Inclusion,
    /// `subject =~ pattern` (regular expression)
    Regexp,
    /// `subject LIKE pattern` (`%`/`_` SQL-style wildcards)
    Like,
    /// `subject > value`
    GreaterThan,
    /// `subject >= value`
    GreaterOrEqual,
    /// `subject < value`
    LessThan,
    /// `subject <= value`
    LessOrEqual,
}

impl ComparisonKind {
    /// The operator token used when rendering a comparison.
    pub fn operator(&self) -> &'static str {
        match self {
            ComparisonKind::Equal => "=",
            ComparisonKind::Inclusion => "IN",
            ComparisonKind::Regexp => "=~",
            ComparisonKind::Like => "LIKE",
            ComparisonKind::GreaterThan => ">",
            ComparisonKind::GreaterOrEqual => ">=",
            ComparisonKind::LessThan => "<",
            ComparisonKind::LessOrEqual => "<=",
        }
    }
}

/// Inclusive/exclusive bounds for range-based inclusion.
///
/// Both endpoints carry their own inclusivity flag so half-open ranges
/// survive typecasting intact.
#[derive(Clone, Debug, PartialEq)]
pub struct Bound {
    lower: Value,
    upper: Value,
    lower_inclusive: bool,
    upper_inclusive: bool,
}

impl Bound {
    /// A range with both endpoints included.
    pub fn inclusive(lower: impl Into<Value>, upper: impl Into<Value>) -> Bound {
        Bound::new(lower, upper, true, true)
    }

    /// A range with an excluded upper endpoint.
    pub fn half_open(lower: impl Into<Value>, upper: impl Into<Value>) -> Bound {
        Bound::new(lower, upper, true, false)
    }

    /// A range with independently controlled endpoint inclusivity.
    pub fn new(
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> Bound {
        Bound {
            lower: lower.into(),
            upper: upper.into(),
            lower_inclusive,
            upper_inclusive,
        }
    }

    pub fn lower(&self) -> &Value {
        &self.lower
    }

    pub fn upper(&self) -> &Value {
        &self.upper
    }

    /// Membership test. Null is never inside a range.
    pub fn contains(&self, value: &Value) -> bool {
        if value.is_null() || self.lower.is_null() || self.upper.is_null() {
            return false;
        }

        let above_lower = if self.lower_inclusive {
            *value >= self.lower
        } else {
            *value > self.lower
        };
        let below_upper = if self.upper_inclusive {
            *value <= self.upper
        } else {
            *value < self.upper
        };
        above_lower && below_upper
    }

    fn map_endpoints(
        &self,
        f: impl Fn(Value) -> QuarryResult<Value>,
    ) -> QuarryResult<Bound> {
        Ok(Bound {
            lower: f(self.lower.clone())?,
            upper: f(self.upper.clone())?,
            lower_inclusive: self.lower_inclusive,
            upper_inclusive: self.upper_inclusive,
        })
    }
}

impl Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = if self.lower_inclusive { "[" } else { "(" };
        let close = if self.upper_inclusive { "]" } else { ")" };
        write!(f, "{}{}, {}{}", open, self.lower, self.upper, close)
    }
}

/// The expected-value side of a comparison: a single value, a set of
/// values, a range, or a collection handle (a nested query).
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// One value
    Single(Value),
    /// A set of values
    Set(Vec<Value>),
    /// A range with endpoint inclusivity
    Bound(Bound),
    /// A collection handle: membership in the result set of a query
    Query(Box<Query>),
}

impl Operand {
    /// Wraps a single raw value.
    pub fn value(value: impl Into<Value>) -> Operand {
        Operand::Single(value.into())
    }

    /// Wraps a set of raw values.
    pub fn set(values: Vec<Value>) -> Operand {
        Operand::Set(values)
    }

    /// Wraps a query as a collection handle.
    pub fn query(query: Query) -> Operand {
        Operand::Query(Box::new(query))
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Single(value) => write!(f, "{}", value),
            Operand::Set(values) => {
                write!(f, "[{}]", values.iter().map(|v| v.to_string()).join(", "))
            }
            Operand::Bound(bound) => write!(f, "{}", bound),
            Operand::Query(query) => write!(f, "<query on {}>", query.model().name()),
        }
    }
}

/// A leaf predicate: one typed comparison of a subject against an expected
/// value.
///
/// A comparison is immutable after construction. The raw value is typecast
/// through the subject at construction time, and the typed value is dumped
/// to storage form alongside it; typecast failures propagate and are never
/// swallowed. LIKE and regexp patterns compile lazily on first match and
/// the compiled form is cached.
///
/// Structural equality is `(kind, subject, typed value)`.
#[derive(Clone)]
pub struct Comparison {
    kind: ComparisonKind,
    subject: Subject,
    value: Operand,
    dumped: Operand,
    pattern: Arc<OnceLock<Option<Regex>>>,
}

impl Comparison {
    /// Creates a comparison, typecasting and dumping the raw operand
    /// according to the kind.
    ///
    /// Fails with [ErrorKind::ConditionError] when the operand shape does
    /// not fit the kind (only inclusion accepts sets, ranges and
    /// collections), and propagates [ErrorKind::TypecastError] from the
    /// subject.
    pub fn new(kind: ComparisonKind, subject: Subject, raw: Operand) -> QuarryResult<Comparison> {
        let (value, dumped) = match kind {
            ComparisonKind::Inclusion => Self::cast_inclusion(&subject, raw)?,
            ComparisonKind::Like => Self::cast_pattern(kind, &subject, raw)?,
            ComparisonKind::Regexp => Self::cast_pattern(kind, &subject, raw)?,
            _ => Self::cast_single(kind, &subject, raw)?,
        };

        Ok(Comparison {
            kind,
            subject,
            value,
            dumped,
            pattern: Arc::new(OnceLock::new()),
        })
    }

    /// The comparison's operator kind.
    pub fn kind(&self) -> ComparisonKind {
        self.kind
    }

    /// The subject being compared.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// The typecast expected value.
    pub fn value(&self) -> &Operand {
        &self.value
    }

    /// The expected value in storage form.
    pub fn dumped_value(&self) -> &Operand {
        &self.dumped
    }

    fn cast_single(
        kind: ComparisonKind,
        subject: &Subject,
        raw: Operand,
    ) -> QuarryResult<(Operand, Operand)> {
        match raw {
            Operand::Single(value) => {
                let typed = subject.typecast(value)?;
                let dumped = subject.dump(&typed);
                Ok((Operand::Single(typed), Operand::Single(dumped)))
            }
            other => Err(shape_error(kind, subject, &other)),
        }
    }

    fn cast_pattern(
        kind: ComparisonKind,
        subject: &Subject,
        raw: Operand,
    ) -> QuarryResult<(Operand, Operand)> {
        match raw {
            // patterns are kept verbatim; LIKE wildcards and regexps are
            // compiled at match time, not at construction time
            Operand::Single(Value::String(pattern)) => Ok((
                Operand::Single(Value::String(pattern.clone())),
                Operand::Single(Value::String(pattern)),
            )),
            Operand::Single(other) => {
                log::error!(
                    "{} comparison on '{}' requires a string pattern, got {}",
                    kind.operator(),
                    subject,
                    other
                );
                Err(QuarryError::new(
                    &format!(
                        "{} comparison on '{}' requires a string pattern",
                        kind.operator(),
                        subject
                    ),
                    ErrorKind::InvalidDataType,
                ))
            }
            other => Err(shape_error(kind, subject, &other)),
        }
    }

    fn cast_inclusion(subject: &Subject, raw: Operand) -> QuarryResult<(Operand, Operand)> {
        match raw {
            // a bare array is promoted to a set
            Operand::Single(Value::Array(items)) | Operand::Set(items) => {
                let mut typed = Vec::with_capacity(items.len());
                for item in items {
                    typed.push(subject.typecast(item)?);
                }
                let mut dumped: Vec<Value> = Vec::with_capacity(typed.len());
                for value in &typed {
                    let dump = subject.dump(value);
                    if !dumped.contains(&dump) {
                        dumped.push(dump);
                    }
                }
                Ok((Operand::Set(typed), Operand::Set(dumped)))
            }
            // a single record against a relationship acts as a one-element
            // collection
            Operand::Single(Value::Record(record)) if subject.is_relationship() => {
                let typed = vec![Value::Record(record)];
                Ok((Operand::Set(typed.clone()), Operand::Set(typed)))
            }
            Operand::Bound(bound) => {
                let typed = bound.map_endpoints(|v| subject.typecast(v))?;
                let dumped = typed.map_endpoints(|v| Ok(subject.dump(&v)))?;
                Ok((Operand::Bound(typed), Operand::Bound(dumped)))
            }
            Operand::Query(query) => Ok((
                Operand::Query(query.clone()),
                Operand::Query(query),
            )),
            other => Err(shape_error(ComparisonKind::Inclusion, subject, &other)),
        }
    }

    /// Evaluates the comparison against a record.
    ///
    /// The actual value is extracted through the subject; relationship
    /// subjects extract their source key values. Ordering comparisons never
    /// match when either side is null, in any context.
    pub fn matches(&self, record: &Record) -> QuarryResult<bool> {
        let extracted = self.subject.extract(record);

        match self.kind {
            ComparisonKind::Equal => {
                let expected = self.expected_single();
                if expected.is_null() {
                    Ok(extracted.is_null())
                } else {
                    Ok(extracted == *expected)
                }
            }
            ComparisonKind::Inclusion => self.matches_inclusion(record, &extracted),
            ComparisonKind::GreaterThan
            | ComparisonKind::GreaterOrEqual
            | ComparisonKind::LessThan
            | ComparisonKind::LessOrEqual => {
                let expected = self.expected_single();
                // absence never satisfies an ordering predicate
                if extracted.is_null() || expected.is_null() {
                    return Ok(false);
                }
                let ordering = extracted.cmp(expected);
                Ok(match self.kind {
                    ComparisonKind::GreaterThan => ordering.is_gt(),
                    ComparisonKind::GreaterOrEqual => ordering.is_ge(),
                    ComparisonKind::LessThan => ordering.is_lt(),
                    ComparisonKind::LessOrEqual => ordering.is_le(),
                    _ => unreachable!(),
                })
            }
            ComparisonKind::Like | ComparisonKind::Regexp => match extracted.as_str() {
                Some(actual) => {
                    let pattern = self.compiled_pattern()?;
                    Ok(pattern.is_match(actual))
                }
                None => Ok(false),
            },
        }
    }

    fn matches_inclusion(&self, record: &Record, extracted: &Value) -> QuarryResult<bool> {
        match &self.value {
            Operand::Set(items) => {
                if let Some(rel) = self.subject.as_relationship() {
                    // membership among the collection's target key values,
                    // pairing every key of a compound relationship key
                    let targets = rel.target_key();
                    let actuals: Vec<Value> = match extracted {
                        Value::Array(values) if targets.len() > 1 => values.clone(),
                        other => vec![other.clone()],
                    };
                    if actuals.len() != targets.len() || actuals.iter().any(|v| v.is_null()) {
                        return Ok(false);
                    }
                    Ok(items.iter().any(|item| match item.as_record() {
                        Some(rec) => targets
                            .iter()
                            .zip(&actuals)
                            .all(|(target, actual)| rec.get(target) == *actual),
                        None => *item == *extracted,
                    }))
                } else {
                    Ok(items.iter().any(|item| *item == *extracted))
                }
            }
            Operand::Bound(bound) => Ok(bound.contains(extracted)),
            // the relationship short-circuit: a collection handle delegates
            // to its own condition tree
            Operand::Query(query) => match query.conditions() {
                Some(tree) => tree.matches(record),
                None => Ok(true),
            },
            Operand::Single(_) => Ok(false),
        }
    }

    /// Soft validity signal.
    ///
    /// Delegates to the subject; inclusion additionally requires a non-empty
    /// candidate set (an empty set is satisfiable only by vacuity, i.e. when
    /// negated) with every member and both endpoints individually valid.
    pub fn is_valid(&self, negated: bool) -> bool {
        match &self.value {
            Operand::Single(value) => self.subject.validate(value, negated),
            Operand::Set(items) => {
                if items.is_empty() {
                    negated
                } else {
                    items.iter().all(|v| self.subject.validate(v, negated))
                }
            }
            Operand::Bound(bound) => {
                self.subject.validate(bound.lower(), negated)
                    && self.subject.validate(bound.upper(), negated)
            }
            Operand::Query(_) => true,
        }
    }

    /// Builds the comparison's dual: the condition that must hold on the
    /// owning side to reach records matching this comparison, produced by
    /// swapping source and target keys through the relationship's inverse.
    ///
    /// Only available for relationship subjects.
    pub fn foreign_key_mapping(&self) -> QuarryResult<ConditionTree> {
        let rel = self.subject.as_relationship().ok_or_else(|| {
            log::error!(
                "Foreign key mapping requires a relationship subject, got '{}'",
                self.subject
            );
            QuarryError::new(
                "Foreign key mapping requires a relationship subject",
                ErrorKind::ConditionError,
            )
        })?;

        let inverse = rel.inverse()?;
        let mut tree = ConditionTree::new(OperationKind::And);
        let root = tree.root();

        match &self.value {
            Operand::Set(items) => {
                for (source, target) in inverse.target_key().iter().zip(inverse.source_key()) {
                    let field = rel.source().field(source).ok_or_else(|| {
                        QuarryError::new(
                            &format!("Unknown key field '{}' on '{}'", source, rel.source()),
                            ErrorKind::InvalidFieldName,
                        )
                    })?;
                    let values: Vec<Value> = items
                        .iter()
                        .map(|item| match item.as_record() {
                            Some(rec) => rec.get(target),
                            None => item.clone(),
                        })
                        .collect();
                    let comparison = Comparison::new(
                        ComparisonKind::Inclusion,
                        Subject::Field(field),
                        Operand::Set(values),
                    )?;
                    tree.append(root, ConditionOperand::Comparison(comparison))?;
                }
            }
            Operand::Query(query) => {
                if rel.source_key().len() != 1 {
                    return Err(QuarryError::new(
                        "Foreign key mapping through a subquery requires a single-field key",
                        ErrorKind::ConditionError,
                    ));
                }
                let field = rel.source().field(&rel.source_key()[0]).ok_or_else(|| {
                    QuarryError::new(
                        &format!(
                            "Unknown key field '{}' on '{}'",
                            rel.source_key()[0],
                            rel.source()
                        ),
                        ErrorKind::InvalidFieldName,
                    )
                })?;
                let projected = query.as_ref().clone().with_fields(rel.target_key());
                let comparison = Comparison::new(
                    ComparisonKind::Inclusion,
                    Subject::Field(field),
                    Operand::query(projected),
                )?;
                tree.append(root, ConditionOperand::Comparison(comparison))?;
            }
            other => {
                return Err(QuarryError::new(
                    &format!("Cannot build foreign key mapping from operand {}", other),
                    ErrorKind::ConditionError,
                ));
            }
        }

        Ok(tree)
    }

    fn expected_single(&self) -> &Value {
        match &self.value {
            Operand::Single(value) => value,
            // non-single operands only occur for inclusion
            _ => &Value::Null,
        }
    }

    fn compiled_pattern(&self) -> QuarryResult<&Regex> {
        let compiled = self.pattern.get_or_init(|| {
            let raw = match (&self.kind, &self.dumped) {
                (ComparisonKind::Like, Operand::Single(Value::String(s))) => like_to_regex(s),
                (_, Operand::Single(Value::String(s))) => s.clone(),
                _ => return None,
            };
            match Regex::new(&raw) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    log::error!("Invalid pattern '{}' for comparison {}: {}", raw, self, e);
                    None
                }
            }
        });

        compiled.as_ref().ok_or_else(|| {
            QuarryError::new("Invalid regex pattern", ErrorKind::InvalidOperation)
        })
    }
}

/// Translates an SQL LIKE wildcard string into an anchored regular
/// expression: `%` becomes any run of characters, `_` any one character,
/// everything else is escaped literally.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

fn shape_error(kind: ComparisonKind, subject: &Subject, operand: &Operand) -> QuarryError {
    log::error!(
        "Operand {} does not fit a {} comparison on '{}'",
        operand,
        kind.operator(),
        subject
    );
    QuarryError::new(
        &format!(
            "Operand does not fit a {} comparison on '{}'",
            kind.operator(),
            subject
        ),
        ErrorKind::ConditionError,
    )
}

impl PartialEq for Comparison {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.subject == other.subject && self.value == other.value
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.kind.operator(), self.dumped)
    }
}

impl Debug for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Comparison({})", self)
    }
}

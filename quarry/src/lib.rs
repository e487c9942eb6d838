//! # Quarry - Condition Algebra and Query Set-Algebra
//!
//! Quarry is the backend-agnostic query core of an object mapper: typed
//! comparisons over model fields and relationships, boolean condition
//! trees with flattening, deduplication and minimization, a declarative
//! condition builder, and a set algebra (`union`, `intersection`,
//! `difference`) over whole queries that knows how to wrap a paginated or
//! joined side into a key-membership subquery instead of silently widening
//! it.
//!
//! Nothing here talks to a store. A [query::Query] is a plain value
//! describing *which* records, and the in-memory pipeline
//! (`filter_records` → `sort_records` → `limit_records`) evaluates that
//! description against record batches; backends are expected to translate
//! the same description into their own plans.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quarry::common::Value;
//! use quarry::condition::{ConditionBuilder, Operand};
//! use quarry::model::{Field, FieldKind, Model};
//! use quarry::query::{Query, QueryOptions};
//!
//! # fn main() -> quarry::errors::QuarryResult<()> {
//! let people = Model::builder("people")
//!     .field(Field::new("id", FieldKind::Integer).required())
//!     .field(Field::new("name", FieldKind::Text))
//!     .field(Field::new("age", FieldKind::Integer))
//!     .key(&["id"])
//!     .build()?;
//!
//! let adults = ConditionBuilder::new(&people)
//!     .compare("age", quarry::condition::ComparisonKind::GreaterOrEqual, Operand::value(18))?
//!     .exclude("name", Operand::value("Sam"))?
//!     .build();
//!
//! let mut query = Query::new(people);
//! query.update(QueryOptions::new().conditions(adults).limit(10))?;
//!
//! let records = vec![quarry::record! { "id" => 1, "name" => "Dan", "age" => 30 }];
//! let matched = query.match_records(&records)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Values, records, sort order and shared utilities
//! - [`condition`] - Comparison leaves, operation trees, the builder
//! - [`errors`] - Error types and result definitions
//! - [`model`] - Fields, relationships, subjects and model metadata
//! - [`query`] - Query values, composition, set algebra, record pipeline

pub mod common;
pub mod condition;
pub mod errors;
pub mod model;
pub mod query;

pub use common::*;

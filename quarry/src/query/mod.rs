//! Queries over a model: composition, set algebra and the in-memory record
//! pipeline.

mod algebra;
#[allow(clippy::module_inception)]
mod query;
mod records;

pub use query::*;

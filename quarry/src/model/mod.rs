//! Model descriptors: fields, relationships and the subjects comparisons
//! are evaluated against.

mod field;
#[allow(clippy::module_inception)]
mod model;
mod relationship;
mod subject;

pub use field::*;
pub use model::*;
pub use relationship::*;
pub use subject::*;

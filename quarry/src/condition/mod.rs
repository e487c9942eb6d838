//! The condition algebra: comparison leaves, boolean operation trees and
//! the declarative builder on top of them.

mod builder;
mod comparison;
mod operation;

pub use builder::*;
pub use comparison::*;
pub use operation::*;

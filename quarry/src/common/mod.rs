//! Common value and record types shared across the condition and query
//! layers.

mod record;
mod sort_order;
mod util;
mod value;

pub use record::*;
pub use sort_order::*;
pub use util::*;
pub use value::*;

//! Shared building blocks: the [Value] model, field lists, sort order and
//! the lock helpers used by every stateful handle.

mod constants;
mod fields;
mod sort_order;
mod type_utils;
mod value;

pub use constants::*;
pub use fields::*;
pub use sort_order::*;
pub use type_utils::*;
pub use value::*;
pub(crate) use value::write_json_string;

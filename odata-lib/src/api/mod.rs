//! Entity sets and queries

mod entity_set;
pub mod query;

pub use entity_set::*;

//! Query building and execution.
//!
//! - [`Criteria`] - one `$filter` expression, typed by the schema property it targets
//! - [`OrderBy`] - ordering of results
//! - [`Query`] - builder and executor for entity set queries
//! - [`Page`] - a page of results with pagination info
//! - [`Entities`], [`Pages`], [`Batches`] - lazy result iterators

mod builder;
mod criteria;
mod order;
mod page;
mod pages;

pub use builder::Query;
pub use criteria::Criteria;
pub use criteria::Function;
pub use criteria::Operator;
pub use order::Direction;
pub use order::OrderBy;
pub use page::Page;
pub use pages::Batches;
pub use pages::Entities;
pub use pages::Pages;

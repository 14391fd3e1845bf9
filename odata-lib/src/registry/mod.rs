//! Process-wide registries
//!
//! [`PropertyTypeRegistry`] maps EDM type names to property kinds and
//! [`ServiceRegistry`] maps service names and URLs to live services. Both
//! are read-mostly concurrent maps with last-write-wins semantics. Tests
//! clear them through `reset()` and `flush()`.

mod property_type;
mod service;

pub use property_type::*;
pub use service::*;

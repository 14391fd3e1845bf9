//! Typed models

mod entity;
mod navigation;
mod property;
pub mod types;
mod value;

pub use entity::*;
pub use navigation::*;
pub use property::*;
pub use value::*;

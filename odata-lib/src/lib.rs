//! OData client library
//!
//! A blocking client for OData v2/v4 services: EDM metadata parsing, typed
//! property values, lazily materialized entities and a query builder with
//! transparent pagination.
//!
//! # Example
//!
//! ```ignore
//! use odata_lib::Service;
//!
//! let service = Service::builder()
//!     .url("https://services.odata.org/V4/OData/OData.svc")
//!     .build()?;
//!
//! let products = service.entity_set("Products")?;
//! let query = products.query();
//! let cheap = query.criteria("Price").lt(3);
//!
//! for product in query.filter(cheap).order_by("Name").iter() {
//!     let mut product = product?;
//!     println!("{}", product.get("Name")?);
//! }
//! ```

pub mod api;
pub mod error;
pub mod model;
pub mod registry;
pub mod response;
pub mod schema;
pub mod transport;
pub mod xml;

mod client;

pub use api::EntitySet;
pub use client::*;
pub use error::Error;
pub use response::Response;

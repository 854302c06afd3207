//! Product catalog

pub mod model;
pub mod service;

pub use model::{Product, ProductColumn, ProductStatus};
pub use service::{CatalogService, ProductFilter};

//! Products domain module (catalog reference data).
//!
//! This crate contains business rules for products/catalog, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{CatalogEntry, CreateProduct, Product, ProductStatus};

//! Infrastructure layer: configuration, store adapters, and the order
//! placement workflow that runs on top of them.

pub mod config;
pub mod placement;
pub mod store;

pub use config::{Config, ConfigError};
pub use placement::{OrderService, PlacementError};
pub use store::{CatalogStore, OrderStore, StoreError, StoreResult, UnitOfWork};

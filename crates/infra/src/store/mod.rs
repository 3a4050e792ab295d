//! Store boundary for catalog, customer, inventory, and order data.
//!
//! The order placement workflow only talks to these traits. Two adapters
//! implement them:
//! - [`InMemoryStore`]: process-local, for development and tests
//! - [`PostgresStore`]: sqlx over a `PgPool`
//!
//! ## Units of work
//!
//! [`OrderStore::begin`] opens a [`UnitOfWork`]. Everything done through it is
//! invisible to other callers until [`UnitOfWork::commit`]. Calling
//! [`UnitOfWork::rollback`], or dropping the unit of work without committing,
//! discards every change it made.

use async_trait::async_trait;
use thiserror::Error;

use oms_core::{CustomerId, OrderId, ProductId};
use oms_inventory::{InventoryRecord, Quantity, StockDecrement};
use oms_parties::{Customer, RegisterCustomer};
use oms_products::{CatalogEntry, CreateProduct, Product};
use oms_sales::{DraftLine, Order, OrderDetails, OrderDraft, OrderHeaderView, OrderLineItem};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure failure at the store boundary.
///
/// These are never business-rule outcomes: a missing row is `Ok(None)` and
/// an insufficient stock level is [`StockDecrement::Insufficient`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A uniqueness or state constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store cannot serve requests (pool closed, timed out, shut down).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be turned back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// One atomic group of store operations.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_customer(&mut self, id: CustomerId) -> StoreResult<Option<Customer>>;

    async fn find_product(&mut self, id: ProductId) -> StoreResult<Option<Product>>;

    /// Decrement-with-check: subtract `quantity` only if the result stays
    /// non-negative. No concurrent unit of work can interleave between the
    /// check and the write.
    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<StockDecrement>;

    async fn insert_order(&mut self, draft: &OrderDraft) -> StoreResult<Order>;

    async fn insert_order_item(
        &mut self,
        order_id: OrderId,
        line: &DraftLine,
    ) -> StoreResult<OrderLineItem>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}

/// Order persistence and reads.
#[async_trait]
pub trait OrderStore: Send + Sync {
    type Work: UnitOfWork + 'static;

    async fn begin(&self) -> StoreResult<Self::Work>;

    /// Order header joined with the customer, plus line items joined with products.
    async fn find_order(&self, id: OrderId) -> StoreResult<Option<OrderDetails>>;

    /// Order headers, most recently created first.
    async fn list_orders(&self) -> StoreResult<Vec<OrderHeaderView>>;
}

/// Catalog, inventory, and customer directory operations outside the
/// placement workflow.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Active products with their available quantity.
    async fn list_products(&self) -> StoreResult<Vec<CatalogEntry>>;

    /// Insert a product and its inventory record. A duplicate `product_code`
    /// is [`StoreError::Conflict`].
    async fn create_product(&self, cmd: CreateProduct) -> StoreResult<CatalogEntry>;

    /// Add stock; `Ok(None)` when the product does not exist.
    async fn restock(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<Option<InventoryRecord>>;

    async fn list_customers(&self) -> StoreResult<Vec<Customer>>;

    async fn register_customer(&self, cmd: RegisterCustomer) -> StoreResult<Customer>;
}

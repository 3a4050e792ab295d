//! Postgres-backed store.
//!
//! A unit of work is a `sqlx::Transaction`. Dropping it without commit rolls
//! the transaction back, which covers cancelled and timed-out requests.
//!
//! ## Decrement-with-check
//!
//! Stock is decremented with a single conditional statement:
//!
//! ```sql
//! UPDATE inventory SET quantity = quantity - $2
//! WHERE product_id = $1 AND quantity >= $2
//! RETURNING quantity
//! ```
//!
//! A concurrent transaction touching the same row blocks on the row lock and
//! re-evaluates the `WHERE` clause after the first one finishes, so two
//! placements can never both pass the check against the same stock.
//!
//! ## Error mapping
//!
//! | SQLx error | Code | StoreError |
//! |------------|------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (check violation) | `23514` | `Conflict` |
//! | Database (numeric out of range) | `22003` | `Conflict` |
//! | Database (other) | any | `Database` |
//! | PoolClosed / PoolTimedOut | n/a | `Unavailable` |
//! | Decode / ColumnDecode | n/a | `Corrupt` |
//! | Other | n/a | `Database` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;

use oms_core::{CustomerId, Money, OrderId, OrderItemId, ProductId};
use oms_inventory::{InventoryRecord, Quantity, StockDecrement};
use oms_parties::{ContactInfo, Customer, CustomerSummary, RegisterCustomer};
use oms_products::{CatalogEntry, CreateProduct, Product, ProductStatus};
use oms_sales::{
    DraftLine, Order, OrderDetails, OrderDraft, OrderHeaderView, OrderItemView, OrderLineItem,
    OrderStatus,
};

use super::{CatalogStore, OrderStore, StoreError, StoreResult, UnitOfWork};
use crate::config::DatabaseConfig;

/// Postgres store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the pool and apply embedded migrations.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.migrate().await?;
        tracing::info!(max_connections = config.max_connections, "connected to postgres");
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ---- rows -----------------------------------------------------------------

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    product_code: String,
    name: String,
    description: String,
    price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_raw(row.id),
            product_code: row.product_code,
            name: row.name,
            description: row.description,
            price: stored_money("products.price", row.price)?,
            status: ProductStatus::parse(&row.status).map_err(|e| corrupt("products.status", e))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CatalogRow {
    #[sqlx(flatten)]
    product: ProductRow,
    quantity: i64,
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: i64,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: CustomerId::from_raw(row.id),
            name: row.name,
            contact: ContactInfo {
                email: row.email,
                phone: row.phone,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    customer_id: i64,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: OrderId::from_raw(row.id),
            customer_id: CustomerId::from_raw(row.customer_id),
            total_amount: stored_money("orders.total_amount", row.total_amount)?,
            status: OrderStatus::from_stored(&row.status),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderHeaderRow {
    #[sqlx(flatten)]
    order: OrderRow,
    customer_name: String,
    customer_email: Option<String>,
    customer_phone: Option<String>,
}

impl TryFrom<OrderHeaderRow> for OrderHeaderView {
    type Error = StoreError;

    fn try_from(row: OrderHeaderRow) -> Result<Self, Self::Error> {
        let order = Order::try_from(row.order)?;
        Ok(OrderHeaderView {
            customer: CustomerSummary {
                id: order.customer_id,
                name: row.customer_name,
                email: row.customer_email,
                phone: row.customer_phone,
            },
            order,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    qty: i32,
    price: Decimal,
}

impl TryFrom<OrderItemRow> for OrderLineItem {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(OrderLineItem {
            id: OrderItemId::from_raw(row.id),
            order_id: OrderId::from_raw(row.order_id),
            product_id: ProductId::from_raw(row.product_id),
            quantity: Quantity::new(i64::from(row.qty)).map_err(|e| corrupt("order_items.qty", e))?,
            unit_price: stored_money("order_items.price", row.price)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemViewRow {
    id: i64,
    product_id: i64,
    qty: i32,
    price: Decimal,
    product_code: String,
    product_name: String,
}

impl TryFrom<OrderItemViewRow> for OrderItemView {
    type Error = StoreError;

    fn try_from(row: OrderItemViewRow) -> Result<Self, Self::Error> {
        Ok(OrderItemView {
            id: OrderItemId::from_raw(row.id),
            product_id: ProductId::from_raw(row.product_id),
            qty: Quantity::new(i64::from(row.qty)).map_err(|e| corrupt("order_items.qty", e))?,
            price: stored_money("order_items.price", row.price)?,
            product_code: row.product_code,
            product_name: row.product_name,
        })
    }
}

fn stored_money(column: &str, value: Decimal) -> StoreResult<Money> {
    Money::new(value).map_err(|e| corrupt(column, e))
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{column}: {err}"))
}

/// `Quantity` is capped at `i32::MAX`, matching the `INTEGER` columns.
fn qty_param(quantity: Quantity) -> i32 {
    i32::try_from(quantity.get()).unwrap_or(i32::MAX)
}

const PRODUCT_COLUMNS: &str = "id, product_code, name, description, price, status, created_at";
const CUSTOMER_COLUMNS: &str = "id, name, email, phone, created_at";
const ORDER_HEADER_SELECT: &str = r#"
    SELECT o.id, o.customer_id, o.total_amount, o.status, o.created_at,
           c.name AS customer_name, c.email AS customer_email, c.phone AS customer_phone
    FROM orders o
    JOIN customers c ON c.id = o.customer_id
"#;

// ---- unit of work ---------------------------------------------------------

/// Unit of work backed by one database transaction.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[instrument(skip(self), fields(customer_id = %id), err)]
    async fn find_customer(&mut self, id: CustomerId) -> StoreResult<Option<Customer>> {
        let row: Option<CustomerRow> =
            sqlx::query_as(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("find_customer", e))?;
        Ok(row.map(Customer::from))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("find_product", e))?;
        row.map(Product::try_from).transpose()
    }

    #[instrument(skip(self), fields(product_id = %product_id, quantity = %quantity), err)]
    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<StockDecrement> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE inventory
            SET quantity = quantity - $2, updated_at = NOW()
            WHERE product_id = $1 AND quantity >= $2
            RETURNING quantity
            "#,
        )
        .bind(product_id.get())
        .bind(qty_param(quantity))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        if let Some(remaining) = remaining {
            return Ok(StockDecrement::Applied {
                remaining: i64::from(remaining),
            });
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT quantity FROM inventory WHERE product_id = $1")
                .bind(product_id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("read_stock", e))?;

        Ok(StockDecrement::Insufficient {
            available: available.map(i64::from).unwrap_or(0),
        })
    }

    #[instrument(skip(self, draft), fields(customer_id = %draft.customer_id), err)]
    async fn insert_order(&mut self, draft: &OrderDraft) -> StoreResult<Order> {
        let row: OrderRow = sqlx::query_as(
            r#"
            INSERT INTO orders (customer_id, total_amount, status)
            VALUES ($1, $2, $3)
            RETURNING id, customer_id, total_amount, status, created_at
            "#,
        )
        .bind(draft.customer_id.get())
        .bind(draft.total_amount.amount())
        .bind(draft.status.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        Order::try_from(row)
    }

    #[instrument(skip(self, line), fields(order_id = %order_id, product_id = %line.product_id), err)]
    async fn insert_order_item(
        &mut self,
        order_id: OrderId,
        line: &DraftLine,
    ) -> StoreResult<OrderLineItem> {
        let row: OrderItemRow = sqlx::query_as(
            r#"
            INSERT INTO order_items (order_id, product_id, qty, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, product_id, qty, price
            "#,
        )
        .bind(order_id.get())
        .bind(line.product_id.get())
        .bind(qty_param(line.quantity))
        .bind(line.unit_price.amount())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        OrderLineItem::try_from(row)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}

// ---- stores ---------------------------------------------------------------

#[async_trait]
impl OrderStore for PostgresStore {
    type Work = PgUnitOfWork;

    async fn begin(&self) -> StoreResult<Self::Work> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PgUnitOfWork { tx })
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn find_order(&self, id: OrderId) -> StoreResult<Option<OrderDetails>> {
        let header: Option<OrderHeaderRow> =
            sqlx::query_as(&format!("{ORDER_HEADER_SELECT} WHERE o.id = $1"))
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_order", e))?;

        let Some(header) = header else {
            return Ok(None);
        };

        let items: Vec<OrderItemViewRow> = sqlx::query_as(
            r#"
            SELECT oi.id, oi.product_id, oi.qty, oi.price,
                   p.product_code, p.name AS product_name
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id ASC
            "#,
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_order_items", e))?;

        Ok(Some(OrderDetails {
            order: OrderHeaderView::try_from(header)?,
            items: items
                .into_iter()
                .map(OrderItemView::try_from)
                .collect::<StoreResult<Vec<_>>>()?,
        }))
    }

    #[instrument(skip(self), err)]
    async fn list_orders(&self) -> StoreResult<Vec<OrderHeaderView>> {
        let rows: Vec<OrderHeaderRow> =
            sqlx::query_as(&format!("{ORDER_HEADER_SELECT} ORDER BY o.created_at DESC, o.id DESC"))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_orders", e))?;
        rows.into_iter().map(OrderHeaderView::try_from).collect()
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list_products(&self) -> StoreResult<Vec<CatalogEntry>> {
        let rows: Vec<CatalogRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.product_code, p.name, p.description, p.price, p.status, p.created_at,
                   COALESCE(i.quantity, 0)::BIGINT AS quantity
            FROM products p
            LEFT JOIN inventory i ON i.product_id = p.id
            WHERE p.status = 'ACTIVE'
            ORDER BY p.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(CatalogEntry {
                    product: Product::try_from(row.product)?,
                    quantity: row.quantity,
                })
            })
            .collect()
    }

    #[instrument(skip(self, cmd), fields(product_code = %cmd.product_code), err)]
    async fn create_product(&self, cmd: CreateProduct) -> StoreResult<CatalogEntry> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row: ProductRow = sqlx::query_as(&format!(
            "INSERT INTO products (product_code, name, description, price, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&cmd.product_code)
        .bind(&cmd.name)
        .bind(&cmd.description)
        .bind(cmd.price.amount())
        .bind(cmd.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        let quantity = i32::try_from(cmd.initial_quantity).unwrap_or(i32::MAX);
        sqlx::query("INSERT INTO inventory (product_id, quantity) VALUES ($1, $2)")
            .bind(row.id)
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_inventory", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(CatalogEntry {
            product: Product::try_from(row)?,
            quantity: i64::from(quantity),
        })
    }

    #[instrument(skip(self), fields(product_id = %product_id, quantity = %quantity), err)]
    async fn restock(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<Option<InventoryRecord>> {
        let level: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO inventory (product_id, quantity)
            SELECT id, $2 FROM products WHERE id = $1
            ON CONFLICT (product_id) DO UPDATE
            SET quantity = inventory.quantity + EXCLUDED.quantity, updated_at = NOW()
            RETURNING quantity
            "#,
        )
        .bind(product_id.get())
        .bind(qty_param(quantity))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("restock", e))?;

        level
            .map(|q| {
                InventoryRecord::new(product_id, i64::from(q)).map_err(|e| corrupt("inventory.quantity", e))
            })
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        let rows: Vec<CustomerRow> =
            sqlx::query_as(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY id ASC"))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_customers", e))?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    #[instrument(skip(self, cmd), err)]
    async fn register_customer(&self, cmd: RegisterCustomer) -> StoreResult<Customer> {
        let row: CustomerRow = sqlx::query_as(&format!(
            "INSERT INTO customers (name, email, phone) VALUES ($1, $2, $3) RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(&cmd.name)
        .bind(&cmd.contact.email)
        .bind(&cmd.contact.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("register_customer", e))?;
        Ok(Customer::from(row))
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    let constraint = match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            // unique, foreign key, check, numeric out of range
            Some("23505") | Some("23503") | Some("23514") | Some("22003") => {
                Some(db_err.message().to_string())
            }
            _ => None,
        },
        _ => None,
    };
    if let Some(message) = constraint {
        return StoreError::Conflict(format!("{operation}: {message}"));
    }

    match err {
        e @ (sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut) => {
            StoreError::Unavailable(format!("{operation}: {e}"))
        }
        e @ (sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. }) => {
            StoreError::Corrupt(format!("{operation}: {e}"))
        }
        source => StoreError::Database { operation, source },
    }
}

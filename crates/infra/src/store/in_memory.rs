//! Process-local store for development and tests.
//!
//! A unit of work holds the store's async mutex for its whole lifetime, so
//! units of work are serialized. Every mutation is journaled; rollback (or
//! dropping the unit of work uncommitted) replays the journal backwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;

use oms_core::{CustomerId, Entity, OrderId, OrderItemId, ProductId};
use oms_inventory::{InventoryRecord, Quantity, StockDecrement, decide_decrement};
use oms_parties::{Customer, RegisterCustomer};
use oms_products::{CatalogEntry, CreateProduct, Product};
use oms_sales::{
    DraftLine, Order, OrderDetails, OrderDraft, OrderHeaderView, OrderItemView, OrderLineItem,
};

use super::{CatalogStore, OrderStore, StoreError, StoreResult, UnitOfWork};

/// Injected failure for exercising rollback paths.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailPoint {
    /// Fail the item insert that follows `after` successful ones.
    InsertOrderItem { after: usize },
    Commit,
}

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    inventory: HashMap<ProductId, i64>,
    customers: BTreeMap<CustomerId, Customer>,
    orders: BTreeMap<OrderId, Order>,
    items: Vec<OrderLineItem>,
    last_product_id: i64,
    last_customer_id: i64,
    last_order_id: i64,
    last_item_id: i64,
    #[cfg(test)]
    fail_point: Option<FailPoint>,
}

impl State {
    fn catalog_entry(&self, product: &Product) -> CatalogEntry {
        CatalogEntry {
            product: product.clone(),
            quantity: self.inventory.get(&product.id).copied().unwrap_or(0),
        }
    }

    fn header(&self, order: &Order) -> StoreResult<OrderHeaderView> {
        let customer = self.customers.get(&order.customer_id).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "order {} references missing customer {}",
                order.id, order.customer_id
            ))
        })?;
        Ok(OrderHeaderView {
            order: order.clone(),
            customer: customer.summary(),
        })
    }

    fn details(&self, order: &Order) -> StoreResult<OrderDetails> {
        let items = self
            .items
            .iter()
            .filter(|item| item.order_id == order.id)
            .map(|item| {
                let product = self.products.get(&item.product_id).ok_or_else(|| {
                    StoreError::Corrupt(format!(
                        "order item {} references missing product {}",
                        item.id, item.product_id
                    ))
                })?;
                Ok(OrderItemView {
                    id: item.id,
                    product_id: item.product_id,
                    qty: item.quantity,
                    price: item.unit_price,
                    product_code: product.product_code.clone(),
                    product_name: product.name.clone(),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(OrderDetails {
            order: self.header(order)?,
            items,
        })
    }
}

/// Insert or replace a row keyed by its own id.
fn put<E>(table: &mut BTreeMap<E::Id, E>, row: &E)
where
    E: Entity + Clone,
{
    table.insert(*row.id(), row.clone());
}

/// In-memory store. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current inventory level of a product (`None` without a record).
    pub async fn stock_level(&self, product_id: ProductId) -> Option<i64> {
        self.state.lock().await.inventory.get(&product_id).copied()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn order_item_count(&self) -> usize {
        self.state.lock().await.items.len()
    }

    #[cfg(test)]
    pub(crate) async fn fail_next(&self, point: FailPoint) {
        self.state.lock().await.fail_point = Some(point);
    }
}

#[derive(Debug)]
enum Undo {
    Stock { product_id: ProductId, previous: Option<i64> },
    Order(OrderId),
    Item(OrderItemId),
}

/// Unit of work over [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    guard: Option<OwnedMutexGuard<State>>,
    journal: Vec<Undo>,
    items_inserted: usize,
}

impl InMemoryUnitOfWork {
    fn state(&mut self) -> StoreResult<&mut State> {
        self.guard
            .as_deref_mut()
            .ok_or_else(|| StoreError::Unavailable("unit of work already finished".to_string()))
    }

    fn undo_all(&mut self) {
        let Some(state) = self.guard.as_deref_mut() else {
            return;
        };
        for entry in self.journal.drain(..).rev() {
            match entry {
                Undo::Stock {
                    product_id,
                    previous: Some(q),
                } => {
                    state.inventory.insert(product_id, q);
                }
                Undo::Stock {
                    product_id,
                    previous: None,
                } => {
                    state.inventory.remove(&product_id);
                }
                Undo::Order(id) => {
                    state.orders.remove(&id);
                }
                Undo::Item(id) => {
                    state.items.retain(|item| item.id != id);
                }
            }
        }
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.journal.is_empty() {
            tracing::debug!(changes = self.journal.len(), "unit of work dropped uncommitted; rolling back");
            self.undo_all();
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_customer(&mut self, id: CustomerId) -> StoreResult<Option<Customer>> {
        Ok(self.state()?.customers.get(&id).cloned())
    }

    async fn find_product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.state()?.products.get(&id).cloned())
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<StockDecrement> {
        let state = self.state()?;
        let previous = state.inventory.get(&product_id).copied();
        let outcome = decide_decrement(previous, quantity);
        if let StockDecrement::Applied { remaining } = outcome {
            state.inventory.insert(product_id, remaining);
            self.journal.push(Undo::Stock {
                product_id,
                previous,
            });
        }
        Ok(outcome)
    }

    async fn insert_order(&mut self, draft: &OrderDraft) -> StoreResult<Order> {
        let state = self.state()?;
        state.last_order_id += 1;
        let order = Order {
            id: OrderId::from_raw(state.last_order_id),
            customer_id: draft.customer_id,
            total_amount: draft.total_amount,
            status: draft.status.clone(),
            created_at: Utc::now(),
        };
        put(&mut state.orders, &order);
        self.journal.push(Undo::Order(order.id));
        Ok(order)
    }

    async fn insert_order_item(
        &mut self,
        order_id: OrderId,
        line: &DraftLine,
    ) -> StoreResult<OrderLineItem> {
        let inserted = self.items_inserted;
        let state = self.state()?;

        #[cfg(test)]
        if let Some(FailPoint::InsertOrderItem { after }) = state.fail_point {
            if after == inserted {
                state.fail_point = None;
                return Err(StoreError::Unavailable("injected failure".to_string()));
            }
        }

        if !state.orders.contains_key(&order_id) {
            return Err(StoreError::Conflict(format!("order {order_id} does not exist")));
        }

        state.last_item_id += 1;
        let item = OrderLineItem {
            id: OrderItemId::from_raw(state.last_item_id),
            order_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        };
        state.items.push(item.clone());
        self.journal.push(Undo::Item(item.id));
        self.items_inserted = inserted + 1;
        Ok(item)
    }

    async fn commit(mut self) -> StoreResult<()> {
        #[cfg(test)]
        {
            let state = self.state()?;
            if state.fail_point == Some(FailPoint::Commit) {
                state.fail_point = None;
                return Err(StoreError::Unavailable("injected commit failure".to_string()));
            }
        }
        self.journal.clear();
        self.guard.take();
        Ok(())
    }

    async fn rollback(mut self) -> StoreResult<()> {
        self.undo_all();
        self.guard.take();
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    type Work = InMemoryUnitOfWork;

    async fn begin(&self) -> StoreResult<Self::Work> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(InMemoryUnitOfWork {
            guard: Some(guard),
            journal: Vec::new(),
            items_inserted: 0,
        })
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn find_order(&self, id: OrderId) -> StoreResult<Option<OrderDetails>> {
        let state = self.state.lock().await;
        state.orders.get(&id).map(|order| state.details(order)).transpose()
    }

    async fn list_orders(&self) -> StoreResult<Vec<OrderHeaderView>> {
        let state = self.state.lock().await;
        let mut orders: Vec<&Order> = state.orders.values().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        orders.into_iter().map(|order| state.header(order)).collect()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn list_products(&self) -> StoreResult<Vec<CatalogEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .values()
            .filter(|p| p.is_listed())
            .map(|p| state.catalog_entry(p))
            .collect())
    }

    #[instrument(skip(self, cmd), fields(product_code = %cmd.product_code))]
    async fn create_product(&self, cmd: CreateProduct) -> StoreResult<CatalogEntry> {
        let mut state = self.state.lock().await;
        if state
            .products
            .values()
            .any(|p| p.product_code == cmd.product_code)
        {
            return Err(StoreError::Conflict(format!(
                "product_code '{}' already exists",
                cmd.product_code
            )));
        }

        state.last_product_id += 1;
        let product = Product {
            id: ProductId::from_raw(state.last_product_id),
            product_code: cmd.product_code,
            name: cmd.name,
            description: cmd.description,
            price: cmd.price,
            status: cmd.status,
            created_at: Utc::now(),
        };
        put(&mut state.products, &product);
        state
            .inventory
            .insert(product.id, i64::from(cmd.initial_quantity));
        Ok(state.catalog_entry(&product))
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn restock(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<Option<InventoryRecord>> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&product_id) {
            return Ok(None);
        }
        let current = state.inventory.get(&product_id).copied().unwrap_or(0);
        let record = InventoryRecord::new(product_id, current)
            .and_then(|r| r.restock(quantity))
            .map_err(|e| StoreError::Conflict(e.detail()))?;
        state.inventory.insert(product_id, record.quantity);
        Ok(Some(record))
    }

    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        Ok(self.state.lock().await.customers.values().cloned().collect())
    }

    async fn register_customer(&self, cmd: RegisterCustomer) -> StoreResult<Customer> {
        let mut state = self.state.lock().await;
        state.last_customer_id += 1;
        let customer = Customer {
            id: CustomerId::from_raw(state.last_customer_id),
            name: cmd.name,
            contact: cmd.contact,
            created_at: Utc::now(),
        };
        put(&mut state.customers, &customer);
        Ok(customer)
    }
}

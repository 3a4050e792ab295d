//! Order placement workflow.
//!
//! One call to [`OrderService::place_order`] runs inside a single unit of
//! work:
//!
//! 1. validate the request (no I/O)
//! 2. load the customer
//! 3. for each requested item, in input order: load the product, resolve the
//!    unit price, decrement stock with check
//! 4. assemble totals, insert the order header and its line items
//! 5. commit
//!
//! Any failure after the unit of work is opened rolls it back, so a rejected
//! placement leaves inventory and orders exactly as they were. Nothing is
//! retried.

use thiserror::Error;
use tracing::{Span, instrument};

use oms_core::{CustomerId, OrderId, ProductId};
use oms_inventory::{Quantity, StockDecrement};
use oms_products::Product;
use oms_sales::{
    OrderDetails, OrderHeaderView, OrderItemView, PlaceOrder, PlaceOrderRequest, PricedLine,
    assemble, resolve_unit_price,
};

use crate::store::{OrderStore, StoreError, StoreResult, UnitOfWork};

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: Quantity,
        available: i64,
    },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl PlacementError {
    /// Rejections caused by the request or the current catalog/stock state.
    pub fn is_business_rejection(&self) -> bool {
        !matches!(self, PlacementError::Persistence(_))
    }
}

/// Order workflows over an [`OrderStore`].
#[derive(Debug, Clone)]
pub struct OrderService<S> {
    store: S,
}

impl<S> OrderService<S>
where
    S: OrderStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Place an order atomically; returns the persisted order with its items.
    #[instrument(
        skip(self, request),
        fields(customer_id = tracing::field::Empty, item_count = tracing::field::Empty)
    )]
    pub async fn place_order(
        &self,
        request: PlaceOrderRequest,
    ) -> Result<OrderDetails, PlacementError> {
        let cmd = request.validate().map_err(|e| {
            let err = PlacementError::InvalidRequest(e.detail());
            tracing::warn!(error = %err, "order rejected");
            err
        })?;

        let span = Span::current();
        span.record("customer_id", cmd.customer_id.get());
        span.record("item_count", cmd.items.len());

        let mut work = self.store.begin().await.map_err(|e| {
            tracing::error!(error = %e, "could not open unit of work");
            PlacementError::from(e)
        })?;

        let outcome = place_in(&mut work, &cmd).await;

        let outcome = match outcome {
            Ok(details) => work.commit().await.map(|_| details).map_err(PlacementError::from),
            Err(err) => {
                if let Err(rollback_err) = work.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        };

        match &outcome {
            Ok(details) => tracing::info!(
                order_id = details.id().get(),
                total_amount = %details.order.order.total_amount,
                "order placed"
            ),
            Err(err) if err.is_business_rejection() => {
                tracing::warn!(error = %err, "order rejected")
            }
            Err(err) => tracing::error!(error = %err, "order placement failed"),
        }

        outcome
    }

    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> StoreResult<Option<OrderDetails>> {
        self.store.find_order(id).await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to read order");
        })
    }

    pub async fn list_orders(&self) -> StoreResult<Vec<OrderHeaderView>> {
        self.store.list_orders().await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to list orders");
        })
    }
}

/// Steps 2 to 4, all through `work`. The caller commits or rolls back.
async fn place_in<W>(work: &mut W, cmd: &PlaceOrder) -> Result<OrderDetails, PlacementError>
where
    W: UnitOfWork,
{
    let customer = work
        .find_customer(cmd.customer_id)
        .await?
        .ok_or(PlacementError::CustomerNotFound(cmd.customer_id))?;

    let mut priced = Vec::with_capacity(cmd.items.len());
    let mut products: Vec<Product> = Vec::with_capacity(cmd.items.len());

    for item in &cmd.items {
        let product = work
            .find_product(item.product_id)
            .await?
            .ok_or(PlacementError::ProductNotFound(item.product_id))?;

        let price = resolve_unit_price(item.unit_price, product.price);

        match work.decrement_stock(item.product_id, item.quantity).await? {
            StockDecrement::Applied { .. } => {}
            StockDecrement::Insufficient { available } => {
                return Err(PlacementError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available,
                });
            }
        }

        tracing::debug!(
            product_id = item.product_id.get(),
            quantity = item.quantity.get(),
            unit_price = %price.unit_price,
            source = ?price.source,
            "line priced"
        );

        priced.push(PricedLine {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: price.unit_price,
        });
        products.push(product);
    }

    let draft = assemble(cmd.customer_id, priced)
        .map_err(|e| PlacementError::InvalidRequest(e.detail()))?;

    let order = work.insert_order(&draft).await?;

    let mut items = Vec::with_capacity(draft.lines.len());
    for (line, product) in draft.lines.iter().zip(&products) {
        let item = work.insert_order_item(order.id, line).await?;
        items.push(OrderItemView {
            id: item.id,
            product_id: item.product_id,
            qty: item.quantity,
            price: item.unit_price,
            product_code: product.product_code.clone(),
            product_name: product.name.clone(),
        });
    }

    Ok(OrderDetails {
        order: OrderHeaderView {
            order,
            customer: customer.summary(),
        },
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use oms_core::Money;
    use oms_parties::{ContactInfo, RegisterCustomer};
    use oms_products::{CreateProduct, ProductStatus};
    use oms_sales::{OrderItemRequest, OrderReadView, OrderStatus};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::store::in_memory::FailPoint;
    use crate::store::{CatalogStore, InMemoryStore};

    struct Fixture {
        service: OrderService<InMemoryStore>,
        customer: CustomerId,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = InMemoryStore::new();
            let customer = store
                .register_customer(RegisterCustomer {
                    name: "Grace".to_string(),
                    contact: ContactInfo {
                        email: Some("grace@example.com".to_string()),
                        phone: None,
                    },
                })
                .await
                .unwrap();
            Self {
                service: OrderService::new(store),
                customer: customer.id,
            }
        }

        fn store(&self) -> &InMemoryStore {
            self.service.store()
        }

        async fn product(&self, code: &str, price: Decimal, stock: u32) -> ProductId {
            self.store()
                .create_product(CreateProduct {
                    product_code: code.to_string(),
                    name: format!("{code} name"),
                    description: String::new(),
                    price: Money::new(price).unwrap(),
                    status: ProductStatus::Active,
                    initial_quantity: stock,
                })
                .await
                .unwrap()
                .product
                .id
        }

        async fn stock(&self, id: ProductId) -> i64 {
            self.store().stock_level(id).await.unwrap_or(0)
        }
    }

    fn request(customer: CustomerId, items: &[(ProductId, i64, Option<Decimal>)]) -> PlaceOrderRequest {
        PlaceOrderRequest {
            customer_id: Some(customer.get()),
            items: Some(
                items
                    .iter()
                    .map(|(p, q, price)| OrderItemRequest {
                        product_id: Some(p.get()),
                        quantity: Some(*q),
                        unit_price: *price,
                    })
                    .collect(),
            ),
        }
    }

    #[tokio::test]
    async fn places_an_order_and_decrements_stock() {
        let fx = Fixture::new().await;
        let p = fx.product("P1", dec!(10.00), 5).await;

        let details = fx
            .service
            .place_order(request(fx.customer, &[(p, 3, None)]))
            .await
            .unwrap();

        assert_eq!(details.order.order.total_amount.amount(), dec!(30.00));
        assert_eq!(details.order.order.status, OrderStatus::New);
        assert_eq!(details.order.customer.name, "Grace");
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].qty.get(), 3);
        assert_eq!(details.items[0].price.amount(), dec!(10.00));
        assert_eq!(details.items[0].product_code, "P1");
        assert!(details.is_conserved());
        assert_eq!(fx.stock(p).await, 2);
    }

    #[tokio::test]
    async fn insufficient_stock_changes_nothing() {
        let fx = Fixture::new().await;
        let p = fx.product("P1", dec!(10.00), 2).await;

        let err = fx
            .service
            .place_order(request(fx.customer, &[(p, 3, None)]))
            .await
            .unwrap_err();

        match err {
            PlacementError::InsufficientStock {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, p);
                assert_eq!(requested.get(), 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(fx.stock(p).await, 2);
        assert_eq!(fx.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_product_rolls_back_earlier_lines() {
        let fx = Fixture::new().await;
        let p = fx.product("P1", dec!(1.00), 10).await;
        let missing = ProductId::from_raw(999);

        let err = fx
            .service
            .place_order(request(fx.customer, &[(p, 4, None), (missing, 1, None)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlacementError::ProductNotFound(id) if id == missing));
        assert_eq!(fx.stock(p).await, 10);
        assert_eq!(fx.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn short_middle_item_rolls_back_the_whole_order() {
        let fx = Fixture::new().await;
        let a = fx.product("A", dec!(1.00), 10).await;
        let b = fx.product("B", dec!(2.00), 1).await;
        let c = fx.product("C", dec!(3.00), 10).await;

        let err = fx
            .service
            .place_order(request(fx.customer, &[(a, 4, None), (b, 2, None), (c, 1, None)]))
            .await
            .unwrap_err();

        match err {
            PlacementError::InsufficientStock {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, b);
                assert_eq!(requested.get(), 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(fx.stock(a).await, 10);
        assert_eq!(fx.stock(b).await, 1);
        assert_eq!(fx.stock(c).await, 10);
        assert_eq!(fx.store().order_count().await, 0);
        assert_eq!(fx.store().order_item_count().await, 0);
    }

    #[tokio::test]
    async fn client_price_overrides_catalog_price() {
        let fx = Fixture::new().await;
        let p = fx.product("P1", dec!(12.00), 5).await;

        let details = fx
            .service
            .place_order(request(fx.customer, &[(p, 2, Some(dec!(4.50)))]))
            .await
            .unwrap();

        assert_eq!(details.items[0].price.amount(), dec!(4.50));
        assert_eq!(details.order.order.total_amount.amount(), dec!(9.00));
    }

    #[tokio::test]
    async fn unknown_order_reads_as_none() {
        let fx = Fixture::new().await;
        assert!(
            fx.service
                .get_order(OrderId::from_raw(12345))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn unknown_customer_is_rejected() {
        let fx = Fixture::new().await;
        let p = fx.product("P1", dec!(1.00), 5).await;

        let err = fx
            .service
            .place_order(request(CustomerId::from_raw(77), &[(p, 1, None)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlacementError::CustomerNotFound(_)));
        assert_eq!(fx.stock(p).await, 5);
    }

    #[tokio::test]
    async fn validation_runs_before_the_store_is_touched() {
        let fx = Fixture::new().await;
        // Holding a unit of work blocks every other `begin`.
        let _held = fx.store().begin().await.unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            fx.service.place_order(PlaceOrderRequest {
                customer_id: Some(fx.customer.get()),
                items: Some(Vec::new()),
            }),
        )
        .await
        .expect("validation must not wait for the store");

        assert!(matches!(outcome, Err(PlacementError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn response_matches_later_reads() {
        let fx = Fixture::new().await;
        let a = fx.product("A", dec!(0.10), 100).await;
        let b = fx.product("B", dec!(3.33), 100).await;

        let created = fx
            .service
            .place_order(request(fx.customer, &[(b, 3, None), (a, 7, None)]))
            .await
            .unwrap();

        let first = fx.service.get_order(created.id()).await.unwrap().unwrap();
        let second = fx.service.get_order(created.id()).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(first, created);
        assert_eq!(first.order.order.total_amount.amount(), dec!(10.69));
        let codes: Vec<&str> = first.items.iter().map(|i| i.product_code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A"]);

        let read = OrderReadView::from(first);
        assert_eq!(read.order, created.order);
        assert_eq!(read.items, created.items);
    }

    #[tokio::test]
    async fn orders_list_most_recent_first() {
        let fx = Fixture::new().await;
        let p = fx.product("P1", dec!(1.00), 10).await;

        let first = fx
            .service
            .place_order(request(fx.customer, &[(p, 1, None)]))
            .await
            .unwrap();
        let second = fx
            .service
            .place_order(request(fx.customer, &[(p, 1, None)]))
            .await
            .unwrap();

        let listed = fx.service.list_orders().await.unwrap();
        let ids: Vec<OrderId> = listed.iter().map(|h| h.order.id).collect();
        assert_eq!(ids, vec![second.id(), first.id()]);
    }

    #[tokio::test]
    async fn failure_while_writing_items_rolls_everything_back() {
        let fx = Fixture::new().await;
        let a = fx.product("A", dec!(2.00), 5).await;
        let b = fx.product("B", dec!(3.00), 5).await;

        fx.store()
            .fail_next(FailPoint::InsertOrderItem { after: 1 })
            .await;

        let err = fx
            .service
            .place_order(request(fx.customer, &[(a, 2, None), (b, 1, None)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlacementError::Persistence(_)));
        assert_eq!(fx.stock(a).await, 5);
        assert_eq!(fx.stock(b).await, 5);
        assert_eq!(fx.store().order_count().await, 0);
        assert_eq!(fx.store().order_item_count().await, 0);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_trace() {
        let fx = Fixture::new().await;
        let a = fx.product("A", dec!(2.00), 5).await;

        fx.store().fail_next(FailPoint::Commit).await;

        let err = fx
            .service
            .place_order(request(fx.customer, &[(a, 2, None)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PlacementError::Persistence(_)));
        assert_eq!(fx.stock(a).await, 5);
        assert_eq!(fx.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn oversized_total_is_an_invalid_request() {
        let fx = Fixture::new().await;
        let p = fx.product("P1", dec!(1.00), 1_000).await;

        let err = fx
            .service
            .place_order(request(
                fx.customer,
                &[(p, 1_000, Some(dec!(999999999999.99)))],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, PlacementError::InvalidRequest(_)));
        assert_eq!(fx.stock(p).await, 1_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_placements_never_oversell() {
        const TASKS: i64 = 8;
        const QTY: i64 = 3;

        let fx = Fixture::new().await;
        let p = fx.product("HOT", dec!(1.00), ((TASKS - 1) * QTY) as u32).await;
        let service = Arc::new(fx.service.clone());

        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let service = Arc::clone(&service);
                let req = request(fx.customer, &[(p, QTY, None)]);
                tokio::spawn(async move { service.place_order(req).await })
            })
            .collect();

        let mut placed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(PlacementError::InsufficientStock { available, .. }) => {
                    assert_eq!(available, 0);
                    rejected += 1;
                }
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }

        assert_eq!(placed, TASKS - 1);
        assert_eq!(rejected, 1);
        assert_eq!(fx.stock(p).await, 0);
        assert_eq!(fx.store().order_count().await, (TASKS - 1) as usize);
    }
}

//! Persisted order model and the read views returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oms_core::{CustomerId, Entity, Money, OrderId, OrderItemId, ProductId};
use oms_inventory::Quantity;
use oms_parties::CustomerSummary;

/// Order lifecycle status.
///
/// Orders are always created as `NEW`. Any other value read back from the
/// store is carried verbatim; no transitions are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    New,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Other(s) => s,
        }
    }

    pub fn from_stored(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("NEW") {
            OrderStatus::New
        } else {
            OrderStatus::Other(raw.to_string())
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        OrderStatus::from_stored(&value)
    }
}

impl From<OrderStatus> for String {
    fn from(value: OrderStatus) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Persisted line item. `unit_price` is frozen at placement time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit_price: Money,
}

/// Order header joined with customer display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeaderView {
    #[serde(flatten)]
    pub order: Order,
    pub customer: CustomerSummary,
}

/// Line item joined with product display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub qty: Quantity,
    pub price: Money,
    pub product_code: String,
    pub product_name: String,
}

impl OrderItemView {
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul_quantity(self.qty.get()).ok()
    }
}

/// Full order payload, as returned by Create Order: `{ order: {..}, items }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: OrderHeaderView,
    pub items: Vec<OrderItemView>,
}

impl OrderDetails {
    pub fn id(&self) -> OrderId {
        self.order.order.id
    }

    /// `total_amount == Σ qty × price` over the line items.
    pub fn is_conserved(&self) -> bool {
        let lines: Option<Vec<Money>> = self.items.iter().map(OrderItemView::line_total).collect();
        lines
            .and_then(|lines| Money::checked_sum(lines).ok())
            .is_some_and(|sum| sum == self.order.order.total_amount)
    }
}

/// Read Order payload: header and customer at the top level, next to `items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReadView {
    #[serde(flatten)]
    pub order: OrderHeaderView,
    pub items: Vec<OrderItemView>,
}

impl From<OrderDetails> for OrderReadView {
    fn from(details: OrderDetails) -> Self {
        Self {
            order: details.order,
            items: details.items,
        }
    }
}

//! Order placement input contract.
//!
//! The wire body is deserialized into [`PlaceOrderRequest`] with every field
//! optional, so a missing field is reported by [`PlaceOrderRequest::validate`]
//! with the field name and item index instead of a generic parse error.

use rust_decimal::Decimal;
use serde::Deserialize;

use oms_core::{CustomerId, DomainError, DomainResult, Money, ProductId};
use oms_inventory::Quantity;

/// Raw "create order" body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub items: Option<Vec<OrderItemRequest>>,
}

/// Raw requested line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderItemRequest {
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub quantity: Option<i64>,
    /// Client-supplied unit price; when absent the catalog price applies.
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

/// Command: PlaceOrder (validated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub customer_id: CustomerId,
    /// Requested lines in input order (never empty).
    pub items: Vec<RequestedItem>,
}

/// One validated requested line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit_price: Option<Money>,
}

impl PlaceOrderRequest {
    /// Check every precondition of order placement. Performs no I/O.
    pub fn validate(self) -> DomainResult<PlaceOrder> {
        let customer_id = match self.customer_id {
            Some(raw) => CustomerId::new(raw)
                .map_err(|_| DomainError::validation(format!(
                    "customer_id must be a positive integer, got {raw}"
                )))?,
            None => return Err(DomainError::validation("customer_id is required")),
        };

        let items = match self.items {
            Some(items) if !items.is_empty() => items,
            _ => return Err(DomainError::validation("items must be a non-empty list")),
        };

        let items = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| item.validate(idx))
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(PlaceOrder { customer_id, items })
    }
}

impl OrderItemRequest {
    fn validate(self, idx: usize) -> DomainResult<RequestedItem> {
        let product_id = match self.product_id {
            Some(raw) => ProductId::new(raw).map_err(|_| {
                DomainError::validation(format!(
                    "items[{idx}].product_id must be a positive integer, got {raw}"
                ))
            })?,
            None => {
                return Err(DomainError::validation(format!(
                    "items[{idx}].product_id is required"
                )));
            }
        };

        let quantity = match self.quantity {
            Some(raw) => Quantity::new(raw)
                .map_err(|e| DomainError::validation(format!("items[{idx}].{}", e.detail())))?,
            None => {
                return Err(DomainError::validation(format!(
                    "items[{idx}].quantity is required"
                )));
            }
        };

        let unit_price = self
            .unit_price
            .map(Money::new)
            .transpose()
            .map_err(|e| DomainError::validation(format!("items[{idx}].unit_price: {}", e.detail())))?;

        Ok(RequestedItem {
            product_id,
            quantity,
            unit_price,
        })
    }
}

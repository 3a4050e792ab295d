//! Sales Orders domain module.
//!
//! This crate contains the order placement rules, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage):
//! - `request`: the validated input contract of order placement
//! - `pricing`: effective unit price of a line item
//! - `assembler`: line totals, order total, and the order ready for persistence
//! - `order`: persisted order/line item model and response views

pub mod assembler;
pub mod order;
pub mod pricing;
pub mod request;

pub use assembler::{DraftLine, OrderDraft, PricedLine, assemble};
pub use order::{
    Order, OrderDetails, OrderHeaderView, OrderItemView, OrderLineItem, OrderReadView, OrderStatus,
};
pub use pricing::{PriceSource, ResolvedPrice, resolve_unit_price};
pub use request::{OrderItemRequest, PlaceOrder, PlaceOrderRequest, RequestedItem};

//! Pure order assembly: priced lines in, totals out.
//!
//! No I/O happens here. The placement workflow resolves prices and stock
//! first, then hands the priced lines to [`assemble`], which owns the
//! arithmetic and the total-conservation invariant.

use oms_core::{CustomerId, DomainError, DomainResult, Money, ProductId};
use oms_inventory::Quantity;

use crate::order::OrderStatus;

/// A requested line whose unit price has been resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit_price: Money,
}

/// A line ready to persist, with its computed total.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DraftLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Order header plus lines, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub lines: Vec<DraftLine>,
}

impl OrderDraft {
    /// `total_amount == Σ line_total`.
    pub fn is_conserved(&self) -> bool {
        Money::checked_sum(self.lines.iter().map(|l| l.line_total))
            .is_ok_and(|sum| sum == self.total_amount)
    }
}

/// Compute line totals and the order total, preserving line order.
pub fn assemble(customer_id: CustomerId, lines: Vec<PricedLine>) -> DomainResult<OrderDraft> {
    if lines.is_empty() {
        return Err(DomainError::validation("an order needs at least one line"));
    }

    let lines = lines
        .into_iter()
        .map(|line| {
            let line_total = line.unit_price.checked_mul_quantity(line.quantity.get())?;
            Ok(DraftLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total,
            })
        })
        .collect::<DomainResult<Vec<_>>>()?;

    let total_amount = Money::checked_sum(lines.iter().map(|l| l.line_total))?;

    Ok(OrderDraft {
        customer_id,
        status: OrderStatus::New,
        total_amount,
        lines,
    })
}

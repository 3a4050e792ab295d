use serde::{Deserialize, Serialize};

use oms_core::{DomainError, DomainResult, ProductId, ValueObject};

/// Strictly positive item count (requested, restocked).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u32);

impl ValueObject for Quantity {}

impl Quantity {
    /// Largest accepted count; the store keeps quantities in 32-bit columns.
    pub const MAX: u32 = i32::MAX as u32;

    pub fn new(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be a positive integer, got {value}"
            )));
        }
        if value > i64::from(Self::MAX) {
            return Err(DomainError::validation(format!(
                "quantity must not exceed {}, got {value}",
                Self::MAX
            )));
        }
        Ok(Self(value as u32))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn as_i64(&self) -> i64 {
        i64::from(self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Quantity::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.as_i64()
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Outcome of a decrement-with-check.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockDecrement {
    /// The decrement was applied; `remaining` is the quantity left.
    Applied { remaining: i64 },
    /// Nothing was changed; `available` is what the ledger holds.
    Insufficient { available: i64 },
}

impl StockDecrement {
    pub fn is_applied(&self) -> bool {
        matches!(self, StockDecrement::Applied { .. })
    }
}

/// Decide a decrement against the current ledger quantity.
///
/// A product without an inventory record has nothing available; that is an
/// insufficient-stock outcome, not an error.
pub fn decide_decrement(available: Option<i64>, requested: Quantity) -> StockDecrement {
    let available = available.unwrap_or(0);
    if available >= requested.as_i64() {
        StockDecrement::Applied {
            remaining: available - requested.as_i64(),
        }
    } else {
        StockDecrement::Insufficient { available }
    }
}

/// Available quantity of one product. Invariant: `quantity >= 0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl InventoryRecord {
    pub fn new(product_id: ProductId, quantity: i64) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        Ok(Self {
            product_id,
            quantity,
        })
    }

    pub fn restock(&self, added: Quantity) -> DomainResult<Self> {
        let quantity = self
            .quantity
            .checked_add(added.as_i64())
            .filter(|q| *q <= i64::from(Quantity::MAX))
            .ok_or_else(|| DomainError::invariant("restock exceeds the maximum stock level"))?;
        Ok(Self {
            product_id: self.product_id,
            quantity,
        })
    }
}

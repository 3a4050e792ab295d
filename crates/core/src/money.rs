//! Currency amounts with exact decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Number of fractional digits carried by every amount.
pub const CURRENCY_SCALE: u32 = 2;

/// Largest amount the store can hold (`NUMERIC(14,2)`): 999 999 999 999.99.
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, CURRENCY_SCALE)
}

/// Non-negative currency amount, always held at [`CURRENCY_SCALE`].
///
/// Serialized as a decimal string (`"30.00"`); deserialization accepts a JSON
/// number or a decimal string and applies the same checks as [`Money::new`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    /// Validate a caller-supplied amount.
    ///
    /// Rejects negative amounts and amounts with more fractional digits than
    /// the currency carries (`10.005`). Trailing zeros are fine (`10.000`).
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "amount must not be negative, got {amount}"
            )));
        }
        if amount.normalize().scale() > CURRENCY_SCALE {
            return Err(DomainError::validation(format!(
                "amount {amount} has more than {CURRENCY_SCALE} decimal places"
            )));
        }
        if amount > max_amount() {
            return Err(DomainError::validation(format!(
                "amount {amount} exceeds the maximum of {}",
                max_amount()
            )));
        }
        let mut amount = amount;
        amount.rescale(CURRENCY_SCALE);
        Ok(Self(amount))
    }

    /// Wrap an amount read back from the store (`NUMERIC(14,2)`).
    pub fn from_raw(amount: Decimal) -> Self {
        let mut amount = amount;
        amount.rescale(CURRENCY_SCALE);
        Self(amount)
    }

    pub fn zero() -> Self {
        Self::from_raw(Decimal::ZERO)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// `self × quantity`, exact. Fails past [`max_amount`].
    pub fn checked_mul_quantity(&self, quantity: u32) -> DomainResult<Self> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .filter(|v| *v <= max_amount())
            .map(Self::from_raw)
            .ok_or_else(|| DomainError::invariant(format!("{} x {} overflows", self.0, quantity)))
    }

    pub fn checked_add(&self, other: Money) -> DomainResult<Self> {
        self.0
            .checked_add(other.0)
            .filter(|v| *v <= max_amount())
            .map(Self::from_raw)
            .ok_or_else(|| DomainError::invariant(format!("{} + {} overflows", self.0, other.0)))
    }

    /// Sum of a sequence of amounts (zero for an empty sequence).
    pub fn checked_sum<I>(amounts: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

//! Unit price resolution for order lines.

use oms_core::Money;

/// Where a line's unit price came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PriceSource {
    ClientSupplied,
    Catalog,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResolvedPrice {
    pub unit_price: Money,
    pub source: PriceSource,
}

/// A client-supplied price is used as-is when present; otherwise the catalog
/// price read in the same unit of work applies.
pub fn resolve_unit_price(client: Option<Money>, catalog: Money) -> ResolvedPrice {
    match client {
        Some(unit_price) => ResolvedPrice {
            unit_price,
            source: PriceSource::ClientSupplied,
        },
        None => ResolvedPrice {
            unit_price: catalog,
            source: PriceSource::Catalog,
        },
    }
}

//! Inventory domain module (stock ledger rules).
//!
//! This crate contains the stock rules, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage). Stores apply these decisions
//! inside their unit of work.

pub mod ledger;

pub use ledger::{InventoryRecord, Quantity, StockDecrement, decide_decrement};

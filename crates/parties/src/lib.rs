//! Parties domain module (customer directory).
//!
//! Customers are reference data for orders; the order workflow reads them but
//! never mutates them.

pub mod customer;

pub use customer::{ContactInfo, Customer, CustomerSummary, RegisterCustomer};

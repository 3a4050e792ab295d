//! Records with a store-assigned identity.

/// Implemented by rows that are tracked by id (products, customers, orders)
/// rather than compared field by field.
pub trait Entity {
    type Id: Copy + Ord + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

//! Immutable values compared by content.

/// Marker for validated values such as [`crate::Money`] or a line quantity.
/// Two instances holding the same content are interchangeable.
pub trait ValueObject: Copy + PartialEq + core::fmt::Debug {}

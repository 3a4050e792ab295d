//! Domain primitives shared by every crate: typed ids, money, and the
//! domain error. No I/O lives here.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, OrderId, OrderItemId, ProductId};
pub use money::Money;
pub use value_object::ValueObject;

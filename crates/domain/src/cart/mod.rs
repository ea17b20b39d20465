//! Cart aggregate and service.

mod aggregate;
mod service;

pub use aggregate::{Cart, CartLine};
pub(crate) use aggregate::ensure_positive_quantity;
pub use service::CartService;

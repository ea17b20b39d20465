//! Shared value types used by every layer of the storefront core.

mod money;
mod status;
mod types;

pub use money::Money;
pub use status::{OrderStatus, ParseOrderStatusError};
pub use types::{CartId, OrderId, OrderItemId, ProductId, ShippingDetailsId, UserId};

//! Order placement and the order status machine.

mod placement;
mod policy;
mod service;
mod status;

pub use placement::{check_stock, snapshot_order};
pub use policy::{ParseStockPolicyError, StockPolicy};
pub use service::OrderService;
pub use status::{StatusChangeOutcome, plan_transition};

//! Domain layer for the storefront order core.
//!
//! This crate provides:
//! - The cart aggregate and its service
//! - Order placement, converting a cart into a price-snapshotted order
//! - The admin-driven order status machine
//! - The stock policy deciding when stock leaves the shelf

pub mod cart;
pub mod error;
pub mod order;

pub use cart::{Cart, CartLine, CartService};
pub use error::DomainError;
pub use order::{
    OrderService, ParseStockPolicyError, StatusChangeOutcome, StockPolicy, check_stock,
    plan_transition, snapshot_order,
};

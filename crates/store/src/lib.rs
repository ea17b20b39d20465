//! Persistence layer for the storefront order core.
//!
//! Exposes the [`StorefrontStore`] trait with an in-memory implementation for
//! tests and local runs, and a PostgreSQL implementation backed by sqlx.
//! Every multi-row write is a single transactional operation.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;
pub mod version;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use record::{
    CartLineRecord, CartLineWrite, CartRecord, CartWrite, NewOrder, NewOrderItem, NewProduct,
    NewShippingDetails, OrderItemRecord, OrderRecord, ProductRecord, ShippingDetailsRecord,
};
pub use store::{PlaceOrderOptions, StatusUpdate, StockDecrement, StorefrontStore};
pub use version::Version;

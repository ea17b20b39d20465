use async_trait::async_trait;
use common::{CartId, Money, OrderId, OrderStatus, ProductId, ShippingDetailsId, UserId};

use crate::{
    CartRecord, CartWrite, NewOrder, NewProduct, NewShippingDetails, OrderRecord, ProductRecord,
    Result, ShippingDetailsRecord, Version,
};

/// Options for converting a cart into an order.
#[derive(Debug, Clone, Copy)]
pub struct PlaceOrderOptions {
    /// The cart being checked out. It is emptied in the same transaction.
    pub cart_id: CartId,
    /// Version of the cart the order was built from. A cart written since
    /// then fails the placement with `ConcurrencyConflict`.
    pub expected_cart_version: Version,
    /// Whether to conditionally decrement stock for every order item.
    pub reserve_stock: bool,
}

/// A units-to-take instruction for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A compare-and-set status change, optionally taking stock with it.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub order_id: OrderId,
    /// The status the order must still be in for the write to apply.
    pub expected: OrderStatus,
    pub new_status: OrderStatus,
    pub decrements: Vec<StockDecrement>,
}

/// Core trait for store implementations.
///
/// Each method is one atomic unit: either every row change it describes is
/// applied or none is. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StorefrontStore: Send + Sync {
    /// Inserts a catalog product.
    async fn insert_product(&self, product: NewProduct) -> Result<ProductRecord>;

    /// Retrieves a product, including soft-deleted ones.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>>;

    /// Changes a product's current prices. Existing orders are unaffected.
    async fn update_product_pricing(
        &self,
        product_id: ProductId,
        sales_price: Money,
        mrp: Money,
    ) -> Result<ProductRecord>;

    /// Marks a product as deleted without removing its row.
    async fn soft_delete_product(&self, product_id: ProductId) -> Result<()>;

    /// Inserts a shipping address.
    async fn insert_shipping_details(
        &self,
        details: NewShippingDetails,
    ) -> Result<ShippingDetailsRecord>;

    /// Retrieves a shipping address by ID.
    async fn get_shipping_details(
        &self,
        id: ShippingDetailsId,
    ) -> Result<Option<ShippingDetailsRecord>>;

    /// Retrieves a user's cart with its lines joined to current product rows.
    ///
    /// Returns None if the user has never had a cart.
    async fn get_cart(&self, user_id: UserId) -> Result<Option<CartRecord>>;

    /// Replaces a cart's lines and total.
    ///
    /// With `expected` at [`Version::initial`] the cart is inserted and the
    /// user must not already have one. Otherwise the stored version must
    /// equal `expected`. Fails with `ConcurrencyConflict` on mismatch.
    async fn save_cart(&self, cart: CartWrite, expected: Version) -> Result<CartRecord>;

    /// Creates an order and its items, optionally decrements stock for every
    /// item, and empties the cart, all in one transaction.
    ///
    /// A stock decrement is applied only where `stock_qty >= quantity`;
    /// otherwise the whole operation fails with `InsufficientStock`.
    async fn place_order(&self, order: NewOrder, options: PlaceOrderOptions)
    -> Result<OrderRecord>;

    /// Retrieves an order with its items and shipping details.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Retrieves a user's orders, newest first.
    async fn get_orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>>;

    /// Retrieves every order, newest first.
    async fn list_orders(&self) -> Result<Vec<OrderRecord>>;

    /// Applies a status change and its stock decrements in one transaction.
    ///
    /// Fails with `StatusConflict` if the order is no longer in
    /// `update.expected`, and with `InsufficientStock` if any decrement
    /// cannot be applied.
    async fn update_order_status(&self, update: StatusUpdate) -> Result<OrderRecord>;
}

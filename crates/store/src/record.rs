//! Row types read from and written to the store.

use chrono::{DateTime, Utc};
use common::{
    CartId, Money, OrderId, OrderItemId, OrderStatus, ProductId, ShippingDetailsId, UserId,
};

use crate::Version;

/// A catalog product as seen by the order core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub images: Vec<String>,
    /// Current selling price per unit.
    pub sales_price: Money,
    /// Current list price per unit.
    pub mrp: Money,
    /// Sellable units. Never negative.
    pub stock_qty: u32,
    /// Soft-deleted products stay in storage but are not sellable.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub images: Vec<String>,
    pub sales_price: Money,
    pub mrp: Money,
    pub stock_qty: u32,
}

impl NewProduct {
    /// Creates a product whose list price equals its sales price.
    pub fn new(name: impl Into<String>, sales_price: Money, stock_qty: u32) -> Self {
        Self {
            name: name.into(),
            images: Vec::new(),
            sales_price,
            mrp: sales_price,
            stock_qty,
        }
    }

    pub fn with_mrp(mut self, mrp: Money) -> Self {
        self.mrp = mrp;
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.images.push(url.into());
        self
    }
}

/// A shipping address owned by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingDetailsRecord {
    pub id: ShippingDetailsId,
    pub user_id: UserId,
    pub street: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a shipping address.
#[derive(Debug, Clone)]
pub struct NewShippingDetails {
    pub user_id: UserId,
    pub street: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
    pub phone: String,
}

/// A user's cart with each line joined to the live product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRecord {
    pub id: CartId,
    pub user_id: UserId,
    /// Cached total as of the last cart write.
    pub total: Money,
    pub version: Version,
    pub items: Vec<CartLineRecord>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineRecord {
    pub product: ProductRecord,
    pub quantity: u32,
}

/// Full replacement state of a cart, written by [`save_cart`](crate::StorefrontStore::save_cart).
#[derive(Debug, Clone)]
pub struct CartWrite {
    pub id: CartId,
    pub user_id: UserId,
    pub total: Money,
    pub lines: Vec<CartLineWrite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLineWrite {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A placed order with its price-snapshotted items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_details_id: ShippingDetailsId,
    /// Total at the time of purchase. Immutable.
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemRecord>,
    pub shipping_details: Option<ShippingDetailsRecord>,
}

/// One order line. Every field is copied at order creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub sales_price: Money,
    pub mrp: Money,
    pub line_total: Money,
}

/// Fields for inserting an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_details_id: ShippingDetailsId,
    pub total: Money,
    pub status: OrderStatus,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub sales_price: Money,
    pub mrp: Money,
    pub line_total: Money,
}

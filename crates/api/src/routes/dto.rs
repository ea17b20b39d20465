//! Response bodies. Field names are camelCase and money is in cents.

use chrono::{DateTime, Utc};
use common::{CartId, OrderId, OrderItemId, OrderStatus, ProductId, ShippingDetailsId, UserId};
use domain::{Cart, CartLine};
use serde::Serialize;
use store::{OrderItemRecord, OrderRecord, ProductRecord, ShippingDetailsRecord};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub images: Vec<String>,
    pub sales_price_cents: i64,
    pub mrp_cents: i64,
    pub stock_qty: u32,
}

impl From<&ProductRecord> for ProductResponse {
    fn from(p: &ProductRecord) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            images: p.images.clone(),
            sales_price_cents: p.sales_price.cents(),
            mrp_cents: p.mrp.cents(),
            stock_qty: p.stock_qty,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    pub product: ProductResponse,
    pub quantity: u32,
    pub line_total_cents: i64,
}

impl From<&CartLine> for CartItemResponse {
    fn from(line: &CartLine) -> Self {
        Self {
            product: line.product().into(),
            quantity: line.quantity(),
            line_total_cents: line.line_total().cents(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub id: CartId,
    pub user_id: UserId,
    pub total_cents: i64,
    pub items: Vec<CartItemResponse>,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            id: cart.id(),
            user_id: cart.user_id(),
            total_cents: cart.total().cents(),
            items: cart.lines().iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetailsResponse {
    pub id: ShippingDetailsId,
    pub street: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
    pub phone: String,
}

impl From<ShippingDetailsRecord> for ShippingDetailsResponse {
    fn from(s: ShippingDetailsRecord) -> Self {
        Self {
            id: s.id,
            street: s.street,
            city: s.city,
            state: s.state,
            pincode: s.pincode,
            country: s.country,
            phone: s.phone,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub sales_price_cents: i64,
    pub mrp_cents: i64,
    pub line_total_cents: i64,
}

impl From<OrderItemRecord> for OrderItemResponse {
    fn from(item: OrderItemRecord) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            sales_price_cents: item.sales_price.cents(),
            mrp_cents: item.mrp.cents(),
            line_total_cents: item.line_total.cents(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_details_id: ShippingDetailsId,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
    pub shipping_details: Option<ShippingDetailsResponse>,
}

impl From<OrderRecord> for OrderResponse {
    fn from(order: OrderRecord) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            shipping_details_id: order.shipping_details_id,
            total_cents: order.total.cents(),
            status: order.status,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: order.items.into_iter().map(Into::into).collect(),
            shipping_details: order.shipping_details.map(Into::into),
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, OrderItemId, ProductId, ShippingDetailsId, UserId};
use tokio::sync::RwLock;

use crate::{
    CartLineRecord, CartLineWrite, CartRecord, CartWrite, NewOrder, NewProduct,
    NewShippingDetails, OrderItemRecord, OrderRecord, ProductRecord, Result,
    ShippingDetailsRecord, StoreError, Version,
    store::{PlaceOrderOptions, StatusUpdate, StockDecrement, StorefrontStore},
};

#[derive(Debug, Clone)]
struct StoredCart {
    id: common::CartId,
    total: Money,
    version: Version,
    lines: Vec<CartLineWrite>,
    updated_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, ProductRecord>,
    shipping: HashMap<ShippingDetailsId, ShippingDetailsRecord>,
    carts: HashMap<UserId, StoredCart>,
    /// Insertion order.
    orders: Vec<OrderRecord>,
}

impl Tables {
    fn cart_record(&self, user_id: UserId, cart: &StoredCart) -> Result<CartRecord> {
        let items = cart
            .lines
            .iter()
            .map(|line| {
                let product = self
                    .products
                    .get(&line.product_id)
                    .cloned()
                    .ok_or(StoreError::ProductNotFound(line.product_id))?;
                Ok(CartLineRecord {
                    product,
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CartRecord {
            id: cart.id,
            user_id,
            total: cart.total,
            version: cart.version,
            items,
            updated_at: cart.updated_at,
        })
    }

    fn with_shipping(&self, mut order: OrderRecord) -> OrderRecord {
        order.shipping_details = self.shipping.get(&order.shipping_details_id).cloned();
        order
    }

    /// Checks every decrement before applying any, so a miss leaves stock untouched.
    fn take_stock(&mut self, decrements: &[StockDecrement]) -> Result<()> {
        let mut requested: HashMap<ProductId, u32> = HashMap::new();
        for d in decrements {
            let total = requested.entry(d.product_id).or_default();
            *total = total
                .checked_add(d.quantity)
                .ok_or(StoreError::QuantityOverflow(d.product_id))?;
        }

        for (product_id, quantity) in &requested {
            let product = self
                .products
                .get(product_id)
                .filter(|p| !p.is_deleted)
                .ok_or(StoreError::ProductNotFound(*product_id))?;
            if product.stock_qty < *quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: *product_id,
                    requested: *quantity,
                    available: product.stock_qty,
                });
            }
        }

        let now = Utc::now();
        for (product_id, quantity) in requested {
            if let Some(product) = self.products.get_mut(&product_id) {
                product.stock_qty -= quantity;
                product.updated_at = now;
            }
        }
        Ok(())
    }
}

/// In-memory store implementation for testing and local runs.
///
/// Each operation holds the write lock for its whole duration, which makes
/// every operation serializable with respect to every other.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl StorefrontStore for InMemoryStore {
    async fn insert_product(&self, product: NewProduct) -> Result<ProductRecord> {
        let now = Utc::now();
        let record = ProductRecord {
            id: ProductId::new(),
            name: product.name,
            images: product.images,
            sales_price: product.sales_price,
            mrp: product.mrp,
            stock_qty: product.stock_qty,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .products
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.tables.read().await.products.get(&product_id).cloned())
    }

    async fn update_product_pricing(
        &self,
        product_id: ProductId,
        sales_price: Money,
        mrp: Money,
    ) -> Result<ProductRecord> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        product.sales_price = sales_price;
        product.mrp = mrp;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn soft_delete_product(&self, product_id: ProductId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        product.is_deleted = true;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_shipping_details(
        &self,
        details: NewShippingDetails,
    ) -> Result<ShippingDetailsRecord> {
        let record = ShippingDetailsRecord {
            id: ShippingDetailsId::new(),
            user_id: details.user_id,
            street: details.street,
            city: details.city,
            state: details.state,
            pincode: details.pincode,
            country: details.country,
            phone: details.phone,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .shipping
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_shipping_details(
        &self,
        id: ShippingDetailsId,
    ) -> Result<Option<ShippingDetailsRecord>> {
        Ok(self.tables.read().await.shipping.get(&id).cloned())
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Option<CartRecord>> {
        let tables = self.tables.read().await;
        tables
            .carts
            .get(&user_id)
            .map(|cart| tables.cart_record(user_id, cart))
            .transpose()
    }

    async fn save_cart(&self, cart: CartWrite, expected: Version) -> Result<CartRecord> {
        let mut tables = self.tables.write().await;

        for line in &cart.lines {
            if !tables.products.contains_key(&line.product_id) {
                return Err(StoreError::ProductNotFound(line.product_id));
            }
        }

        let current = tables
            .carts
            .get(&cart.user_id)
            .map(|c| c.version)
            .unwrap_or(Version::initial());
        if current != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: "cart",
                id: cart.id.to_string(),
                expected,
                actual: current,
            });
        }

        let stored = StoredCart {
            id: cart.id,
            total: cart.total,
            version: current.next(),
            lines: cart.lines,
            updated_at: Utc::now(),
        };
        let record = tables.cart_record(cart.user_id, &stored)?;
        tables.carts.insert(cart.user_id, stored);
        Ok(record)
    }

    async fn place_order(
        &self,
        order: NewOrder,
        options: PlaceOrderOptions,
    ) -> Result<OrderRecord> {
        let mut tables = self.tables.write().await;

        let current = tables
            .carts
            .get(&order.user_id)
            .filter(|c| c.id == options.cart_id)
            .map(|c| c.version)
            .ok_or(StoreError::CartNotFound(options.cart_id))?;
        if current != options.expected_cart_version {
            return Err(StoreError::ConcurrencyConflict {
                entity: "cart",
                id: options.cart_id.to_string(),
                expected: options.expected_cart_version,
                actual: current,
            });
        }

        if options.reserve_stock {
            let decrements: Vec<StockDecrement> = order
                .items
                .iter()
                .map(|item| StockDecrement {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect();
            tables.take_stock(&decrements)?;
        }

        let now = Utc::now();
        let record = OrderRecord {
            id: order.id,
            user_id: order.user_id,
            shipping_details_id: order.shipping_details_id,
            total: order.total,
            status: order.status,
            created_at: now,
            updated_at: now,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemRecord {
                    id: OrderItemId::new(),
                    product_id: item.product_id,
                    product_name: item.product_name,
                    quantity: item.quantity,
                    sales_price: item.sales_price,
                    mrp: item.mrp,
                    line_total: item.line_total,
                })
                .collect(),
            shipping_details: None,
        };
        tables.orders.push(record.clone());

        if let Some(cart) = tables.carts.get_mut(&record.user_id) {
            cart.lines.clear();
            cart.total = Money::zero();
            cart.version = cart.version.next();
            cart.updated_at = now;
        }

        Ok(tables.with_shipping(record))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .map(|o| tables.with_shipping(o)))
    }

    async fn get_orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .map(|o| tables.with_shipping(o))
            .collect())
    }

    async fn list_orders(&self) -> Result<Vec<OrderRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .rev()
            .cloned()
            .map(|o| tables.with_shipping(o))
            .collect())
    }

    async fn update_order_status(&self, update: StatusUpdate) -> Result<OrderRecord> {
        let mut tables = self.tables.write().await;

        let actual = tables
            .orders
            .iter()
            .find(|o| o.id == update.order_id)
            .map(|o| o.status)
            .ok_or(StoreError::OrderNotFound(update.order_id))?;
        if actual != update.expected {
            return Err(StoreError::StatusConflict {
                order_id: update.order_id,
                expected: update.expected,
                actual,
            });
        }

        tables.take_stock(&update.decrements)?;

        let now = Utc::now();
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.id == update.order_id)
            .ok_or(StoreError::OrderNotFound(update.order_id))?;
        order.status = update.new_status;
        order.updated_at = now;
        let order = order.clone();

        Ok(tables.with_shipping(order))
    }
}

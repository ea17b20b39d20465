use std::collections::HashMap;

use async_trait::async_trait;
use common::{
    CartId, Money, OrderId, OrderItemId, OrderStatus, ProductId, ShippingDetailsId, UserId,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::{
    CartLineRecord, CartRecord, CartWrite, NewOrder, NewProduct, NewShippingDetails,
    OrderItemRecord, OrderRecord, ProductRecord, Result, ShippingDetailsRecord, StoreError,
    Version,
    store::{PlaceOrderOptions, StatusUpdate, StockDecrement, StorefrontStore},
};

const PRODUCT_COLUMNS: &str = "id, name, images, sales_price_cents, mrp_cents, stock_qty, is_deleted, created_at, updated_at";

const SHIPPING_COLUMNS: &str =
    "id, user_id, street, city, state, pincode, country, phone, created_at";

const ORDER_COLUMNS: &str =
    "id, user_id, shipping_details_id, total_cents, status, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: &PgRow) -> Result<ProductRecord> {
        Ok(ProductRecord {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            images: row.try_get("images")?,
            sales_price: Money::from_cents(row.try_get("sales_price_cents")?),
            mrp: Money::from_cents(row.try_get("mrp_cents")?),
            stock_qty: to_u32(row.try_get("stock_qty")?, "stock_qty")?,
            is_deleted: row.try_get("is_deleted")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_shipping(row: &PgRow) -> Result<ShippingDetailsRecord> {
        Ok(ShippingDetailsRecord {
            id: ShippingDetailsId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            street: row.try_get("street")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            pincode: row.try_get("pincode")?,
            country: row.try_get("country")?,
            phone: row.try_get("phone")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order_item(row: &PgRow) -> Result<OrderItemRecord> {
        Ok(OrderItemRecord {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: to_u32(row.try_get("quantity")?, "quantity")?,
            sales_price: Money::from_cents(row.try_get("sales_price_cents")?),
            mrp: Money::from_cents(row.try_get("mrp_cents")?),
            line_total: Money::from_cents(row.try_get("line_total_cents")?),
        })
    }

    /// Attaches items and shipping details to order header rows, keeping row order.
    async fn load_orders(&self, rows: Vec<PgRow>) -> Result<Vec<OrderRecord>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let status: String = row.try_get("status")?;
            orders.push(OrderRecord {
                id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
                user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
                shipping_details_id: ShippingDetailsId::from_uuid(
                    row.try_get::<Uuid, _>("shipping_details_id")?,
                ),
                total: Money::from_cents(row.try_get("total_cents")?),
                status: parse_status(&status)?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
                items: Vec::new(),
                shipping_details: None,
            });
        }
        if orders.is_empty() {
            return Ok(orders);
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT order_id, id, product_id, product_name, quantity,
                   sales_price_cents, mrp_cents, line_total_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no ASC
            "#,
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderItemRecord>> = HashMap::new();
        for row in &item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items
                .entry(order_id)
                .or_default()
                .push(Self::row_to_order_item(row)?);
        }

        let shipping_ids: Vec<Uuid> = orders
            .iter()
            .map(|o| o.shipping_details_id.as_uuid())
            .collect();
        let shipping_rows = sqlx::query(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM shipping_details WHERE id = ANY($1)"
        ))
        .bind(&shipping_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut shipping = HashMap::new();
        for row in &shipping_rows {
            let record = Self::row_to_shipping(row)?;
            shipping.insert(record.id, record);
        }

        for order in &mut orders {
            order.items = items.remove(&order.id.as_uuid()).unwrap_or_default();
            order.shipping_details = shipping.get(&order.shipping_details_id).cloned();
        }
        Ok(orders)
    }

    /// Takes `quantity` units only if that many are on hand.
    async fn decrement_stock(
        conn: &mut PgConnection,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_qty = stock_qty - $2, updated_at = NOW()
            WHERE id = $1 AND stock_qty >= $2 AND NOT is_deleted
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let row: Option<(i64, bool)> =
            sqlx::query_as("SELECT stock_qty, is_deleted FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?;

        match row {
            None | Some((_, true)) => Err(StoreError::ProductNotFound(product_id)),
            Some((available, false)) => Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: to_u32(available, "stock_qty")?,
            }),
        }
    }

    async fn take_stock(conn: &mut PgConnection, decrements: &[StockDecrement]) -> Result<()> {
        for d in merge_decrements(decrements)? {
            Self::decrement_stock(conn, d.product_id, d.quantity).await?;
        }
        Ok(())
    }
}

/// Sums decrements per product and orders them by product id, so concurrent
/// transactions lock product rows in the same order.
fn merge_decrements(decrements: &[StockDecrement]) -> Result<Vec<StockDecrement>> {
    let mut merged: Vec<StockDecrement> = Vec::with_capacity(decrements.len());
    let mut sorted = decrements.to_vec();
    sorted.sort_by_key(|d| d.product_id);
    for d in sorted {
        match merged.last_mut() {
            Some(last) if last.product_id == d.product_id => {
                last.quantity = last
                    .quantity
                    .checked_add(d.quantity)
                    .ok_or(StoreError::QuantityOverflow(d.product_id))?;
            }
            _ => merged.push(d),
        }
    }
    Ok(merged)
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} out of range: {value}")))
}

fn parse_status(value: &str) -> Result<OrderStatus> {
    value
        .parse()
        .map_err(|e: common::ParseOrderStatusError| StoreError::Decode(e.to_string()))
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

#[async_trait]
impl StorefrontStore for PostgresStore {
    async fn insert_product(&self, product: NewProduct) -> Result<ProductRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, images, sales_price_cents, mrp_cents, stock_qty)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(ProductId::new().as_uuid())
        .bind(&product.name)
        .bind(&product.images)
        .bind(product.sales_price.cents())
        .bind(product.mrp.cents())
        .bind(i64::from(product.stock_qty))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(&row)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn update_product_pricing(
        &self,
        product_id: ProductId,
        sales_price: Money,
        mrp: Money,
    ) -> Result<ProductRecord> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET sales_price_cents = $2, mrp_cents = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id.as_uuid())
        .bind(sales_price.cents())
        .bind(mrp.cents())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ProductNotFound(product_id))?;

        Self::row_to_product(&row)
    }

    async fn soft_delete_product(&self, product_id: ProductId) -> Result<()> {
        let result =
            sqlx::query("UPDATE products SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(product_id.as_uuid())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id));
        }
        Ok(())
    }

    async fn insert_shipping_details(
        &self,
        details: NewShippingDetails,
    ) -> Result<ShippingDetailsRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO shipping_details (id, user_id, street, city, state, pincode, country, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SHIPPING_COLUMNS}
            "#
        ))
        .bind(ShippingDetailsId::new().as_uuid())
        .bind(details.user_id.as_uuid())
        .bind(&details.street)
        .bind(&details.city)
        .bind(&details.state)
        .bind(&details.pincode)
        .bind(&details.country)
        .bind(&details.phone)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_shipping(&row)
    }

    async fn get_shipping_details(
        &self,
        id: ShippingDetailsId,
    ) -> Result<Option<ShippingDetailsRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM shipping_details WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_shipping).transpose()
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Option<CartRecord>> {
        let Some(row) = sqlx::query(
            "SELECT id, user_id, total_cents, version, updated_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let cart_id = CartId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let line_rows = sqlx::query(
            r#"
            SELECT ci.quantity, p.id, p.name, p.images, p.sales_price_cents, p.mrp_cents,
                   p.stock_qty, p.is_deleted, p.created_at, p.updated_at
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.added_at ASC, p.id ASC
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let items = line_rows
            .iter()
            .map(|line| {
                Ok(CartLineRecord {
                    product: Self::row_to_product(line)?,
                    quantity: to_u32(line.try_get("quantity")?, "quantity")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(CartRecord {
            id: cart_id,
            user_id,
            total: Money::from_cents(row.try_get("total_cents")?),
            version: Version::new(row.try_get("version")?),
            items,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn save_cart(&self, cart: CartWrite, expected: Version) -> Result<CartRecord> {
        let mut tx = self.pool.begin().await?;

        if expected == Version::initial() {
            let inserted = sqlx::query(
                r#"
                INSERT INTO carts (id, user_id, total_cents, version)
                VALUES ($1, $2, $3, 1)
                ON CONFLICT (user_id) DO NOTHING
                "#,
            )
            .bind(cart.id.as_uuid())
            .bind(cart.user_id.as_uuid())
            .bind(cart.total.cents())
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                let actual: i64 = sqlx::query_scalar("SELECT version FROM carts WHERE user_id = $1")
                    .bind(cart.user_id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await?;
                return Err(StoreError::ConcurrencyConflict {
                    entity: "cart",
                    id: cart.id.to_string(),
                    expected,
                    actual: Version::new(actual),
                });
            }
        } else {
            let updated = sqlx::query(
                r#"
                UPDATE carts
                SET total_cents = $3, version = version + 1, updated_at = NOW()
                WHERE id = $1 AND user_id = $2 AND version = $4
                "#,
            )
            .bind(cart.id.as_uuid())
            .bind(cart.user_id.as_uuid())
            .bind(cart.total.cents())
            .bind(expected.as_i64())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                let actual: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM carts WHERE id = $1")
                        .bind(cart.id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(match actual {
                    None => StoreError::CartNotFound(cart.id),
                    Some(actual) => StoreError::ConcurrencyConflict {
                        entity: "cart",
                        id: cart.id.to_string(),
                        expected,
                        actual: Version::new(actual),
                    },
                });
            }
        }

        let kept: Vec<Uuid> = cart.lines.iter().map(|l| l.product_id.as_uuid()).collect();
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND NOT (product_id = ANY($2))")
            .bind(cart.id.as_uuid())
            .bind(&kept)
            .execute(&mut *tx)
            .await?;

        for line in &cart.lines {
            sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, product_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
                "#,
            )
            .bind(cart.id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    return StoreError::ProductNotFound(line.product_id);
                }
                StoreError::Database(e)
            })?;
        }

        tx.commit().await?;

        self.get_cart(cart.user_id)
            .await?
            .ok_or(StoreError::CartNotFound(cart.id))
    }

    async fn place_order(
        &self,
        order: NewOrder,
        options: PlaceOrderOptions,
    ) -> Result<OrderRecord> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM carts WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(options.cart_id.as_uuid())
        .bind(order.user_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let current = Version::new(current.ok_or(StoreError::CartNotFound(options.cart_id))?);
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
            Self::take_stock(&mut tx, &decrements).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, shipping_details_id, total_cents, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.shipping_details_id.as_uuid())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .execute(&mut *tx)
        .await?;

        for (line_no, item) in (1_i32..).zip(&order.items) {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, line_no, product_id, product_name, quantity,
                                         sales_price_cents, mrp_cents, line_total_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(OrderItemId::new().as_uuid())
            .bind(order.id.as_uuid())
            .bind(line_no)
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(i64::from(item.quantity))
            .bind(item.sales_price.cents())
            .bind(item.mrp.cents())
            .bind(item.line_total.cents())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(options.cart_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE carts SET total_cents = 0, version = version + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(options.cart_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(order_id = %order.id, "order rows committed");

        self.get_order(order.id)
            .await?
            .ok_or(StoreError::OrderNotFound(order.id))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        Ok(self.load_orders(rows).await?.into_iter().next())
    }

    async fn get_orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        self.load_orders(rows).await
    }

    async fn list_orders(&self) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.load_orders(rows).await
    }

    async fn update_order_status(&self, update: StatusUpdate) -> Result<OrderRecord> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken here serializes concurrent changes to the same order.
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(update.order_id.as_uuid())
        .bind(update.expected.as_str())
        .bind(update.new_status.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                    .bind(update.order_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match actual {
                None => StoreError::OrderNotFound(update.order_id),
                Some(actual) => StoreError::StatusConflict {
                    order_id: update.order_id,
                    expected: update.expected,
                    actual: parse_status(&actual)?,
                },
            });
        }

        Self::take_stock(&mut tx, &update.decrements).await?;

        tx.commit().await?;

        self.get_order(update.order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(update.order_id))
    }
}

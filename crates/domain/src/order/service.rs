//! Order service coordinating placement, status changes and order queries.

use std::collections::BTreeMap;
use std::time::Instant;

use common::{OrderId, OrderStatus, ProductId, ShippingDetailsId, UserId};
use store::{OrderRecord, PlaceOrderOptions, StoreError, StorefrontStore};

use crate::cart::Cart;
use crate::error::DomainError;

use super::{StatusChangeOutcome, StockPolicy, check_stock, plan_transition, snapshot_order};

/// Checkouts that find the cart changed under them are retried until this
/// many attempts have been made.
const CHECKOUT_ATTEMPTS: u32 = 2;

/// Service for placing and managing orders.
pub struct OrderService<S: StorefrontStore> {
    store: S,
    policy: StockPolicy,
}

impl<S: StorefrontStore> OrderService<S> {
    /// Creates a new order service with the given store and stock policy.
    pub fn new(store: S, policy: StockPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> StockPolicy {
        self.policy
    }

    /// Converts the user's cart into a pending order.
    ///
    /// The order, its items, the stock reservation (under
    /// [`StockPolicy::OnPlacement`]) and the emptied cart are written in one
    /// store transaction. A rejected placement leaves everything untouched.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        shipping_details_id: Option<ShippingDetailsId>,
    ) -> Result<OrderRecord, DomainError> {
        let started = Instant::now();
        let result = self.try_place_order(user_id, shipping_details_id).await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    total = %order.total,
                    items = order.items.len(),
                    "order placed"
                );
            }
            Err(err) => {
                metrics::counter!("order_placement_rejected_total", "reason" => err.kind())
                    .increment(1);
                tracing::warn!(error = %err, "order placement rejected");
            }
        }
        result
    }

    async fn try_place_order(
        &self,
        user_id: UserId,
        shipping_details_id: Option<ShippingDetailsId>,
    ) -> Result<OrderRecord, DomainError> {
        let shipping_details_id = shipping_details_id
            .ok_or_else(|| DomainError::Validation("Shipping details id is required.".into()))?;

        // Another user's address is reported the same as a missing one.
        self.store
            .get_shipping_details(shipping_details_id)
            .await?
            .filter(|details| details.user_id == user_id)
            .ok_or_else(|| DomainError::not_found("Shipping details", shipping_details_id))?;

        let mut attempt = 1;
        loop {
            let cart = self
                .store
                .get_cart(user_id)
                .await?
                .map(Cart::from_record)
                .ok_or(DomainError::CartNotFound)?;

            if cart.is_empty() {
                return Err(DomainError::EmptyCart);
            }

            check_stock(&cart)?;

            let order = snapshot_order(&cart, shipping_details_id)?;
            let names: Vec<(ProductId, String)> = order
                .items
                .iter()
                .map(|i| (i.product_id, i.product_name.clone()))
                .collect();

            let options = PlaceOrderOptions {
                cart_id: cart.id(),
                expected_cart_version: cart.version(),
                reserve_stock: self.policy.reserves_on_placement(),
            };

            // A cart written since it was loaded is checked out again from
            // its new contents. A repeated checkout then finds it empty.
            match self.store.place_order(order, options).await {
                Ok(placed) => return Ok(placed),
                Err(StoreError::ConcurrencyConflict { .. }) if attempt < CHECKOUT_ATTEMPTS => {
                    tracing::debug!(%user_id, attempt, "cart changed during checkout, reloading");
                    attempt += 1;
                }
                Err(err) => return Err(with_product_name(err, &names)),
            }
        }
    }

    /// Moves an order to `new_status` if the status machine allows it.
    #[tracing::instrument(skip(self))]
    pub async fn change_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<StatusChangeOutcome, DomainError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;

        let update = plan_transition(&order, new_status, self.policy)?;
        let names: Vec<(ProductId, String)> = order
            .items
            .iter()
            .map(|i| (i.product_id, i.product_name.clone()))
            .collect();

        // No status another writer can reach from `order.status` allows
        // `new_status`, so losing the race is an invalid transition from it.
        let updated = match self.store.update_order_status(update).await {
            Ok(updated) => updated,
            Err(StoreError::StatusConflict { actual, .. }) => {
                tracing::debug!(%order_id, %actual, to = %new_status, "order status changed first");
                return Err(DomainError::InvalidTransition {
                    from: actual,
                    to: new_status,
                });
            }
            Err(err) => return Err(with_product_name(err, &names)),
        };

        metrics::counter!("order_status_changes_total", "to" => new_status.as_str()).increment(1);
        tracing::info!(%order_id, from = %order.status, to = %new_status, "order status changed");

        Ok(StatusChangeOutcome::new(updated))
    }

    /// Returns the user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>, DomainError> {
        let orders = self.store.get_orders_for_user(user_id).await?;
        if orders.is_empty() {
            return Err(DomainError::NoOrders);
        }
        Ok(orders)
    }

    /// Returns one of the user's orders.
    ///
    /// An order owned by someone else is reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn order_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderRecord, DomainError> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }

    /// Returns every order grouped by the user who placed it, newest first within a group.
    #[tracing::instrument(skip(self))]
    pub async fn orders_grouped_by_user(
        &self,
    ) -> Result<BTreeMap<UserId, Vec<OrderRecord>>, DomainError> {
        let mut grouped: BTreeMap<UserId, Vec<OrderRecord>> = BTreeMap::new();
        for order in self.store.list_orders().await? {
            grouped.entry(order.user_id).or_default().push(order);
        }
        Ok(grouped)
    }
}

/// Maps a store error, naming the product in stock errors.
fn with_product_name(err: StoreError, names: &[(ProductId, String)]) -> DomainError {
    match DomainError::from(err) {
        DomainError::InsufficientStock {
            product_id,
            product_name,
            available,
        } => DomainError::InsufficientStock {
            product_id,
            product_name: names
                .iter()
                .find(|(id, _)| *id == product_id)
                .map(|(_, name)| name.clone())
                .unwrap_or(product_name),
            available,
        },
        other => other,
    }
}

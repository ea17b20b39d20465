//! Cart service loading, mutating and saving a user's cart.

use common::{ProductId, UserId};
use store::{StoreError, StorefrontStore};

use crate::error::DomainError;

use super::{Cart, ensure_positive_quantity};

/// A mutation that loses the version check is replayed on the reloaded cart
/// until this many attempts have been made.
const WRITE_ATTEMPTS: u32 = 2;

/// Service for managing carts.
///
/// Every mutation is read-modify-write against the store with the loaded
/// cart version as the expected version, so concurrent writers to the same
/// cart never lose each other's updates.
pub struct CartService<S: StorefrontStore> {
    store: S,
}

impl<S: StorefrontStore> CartService<S> {
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    async fn load(&self, user_id: UserId) -> Result<Option<Cart>, DomainError> {
        Ok(self.store.get_cart(user_id).await?.map(Cart::from_record))
    }

    /// Loads the cart, lets `apply` produce the cart to write, and saves it.
    ///
    /// `apply` returning `None` means there is nothing to write. Returns the
    /// saved cart, or `None` if nothing was written.
    async fn update<F>(&self, user_id: UserId, apply: F) -> Result<Option<Cart>, DomainError>
    where
        F: Fn(Option<Cart>) -> Result<Option<Cart>, DomainError>,
    {
        let mut attempt = 1;
        loop {
            let Some(cart) = apply(self.load(user_id).await?)? else {
                return Ok(None);
            };

            match self.store.save_cart(cart.to_write(), cart.version()).await {
                Ok(record) => return Ok(Some(Cart::from_record(record))),
                Err(StoreError::ConcurrencyConflict { .. }) if attempt < WRITE_ATTEMPTS => {
                    tracing::debug!(%user_id, attempt, "cart changed concurrently, replaying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Loads the user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, DomainError> {
        self.load(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Cart", user_id))
    }

    /// Sets a product's quantity in the user's cart, creating the cart on first use.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        ensure_positive_quantity(quantity)?;

        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;

        let saved = self
            .update(user_id, |cart| {
                let mut cart = cart.unwrap_or_else(|| Cart::new(user_id));
                cart.add_item(product.clone(), quantity)?;
                Ok(Some(cart))
            })
            .await?
            .ok_or_else(|| DomainError::not_found("Cart", user_id))?;

        metrics::counter!("cart_mutations_total", "op" => "add_item").increment(1);
        tracing::debug!(cart_id = %saved.id(), total = %saved.total(), "cart item set");
        Ok(saved)
    }

    /// Removes a product from the user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, DomainError> {
        let saved = self
            .update(user_id, |cart| {
                let mut cart = cart.ok_or_else(|| DomainError::not_found("Cart", user_id))?;
                cart.remove_item(product_id)?;
                Ok(Some(cart))
            })
            .await?
            .ok_or_else(|| DomainError::not_found("Cart", user_id))?;

        metrics::counter!("cart_mutations_total", "op" => "remove_item").increment(1);
        Ok(saved)
    }

    /// Empties the user's cart.
    ///
    /// Succeeds without writing when the user has no cart or it is already empty.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<(), DomainError> {
        let cleared = self
            .update(user_id, |cart| {
                Ok(cart.filter(|c| !c.is_empty()).map(|mut c| {
                    c.clear();
                    c
                }))
            })
            .await?;

        if cleared.is_some() {
            metrics::counter!("cart_mutations_total", "op" => "clear").increment(1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use store::{InMemoryStore, NewProduct, Version};

    use super::*;

    async fn setup(stock: u32) -> (CartService<InMemoryStore>, ProductId) {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Notebook", Money::from_cents(1_000), stock))
            .await
            .unwrap();
        (CartService::new(store), product.id)
    }

    #[tokio::test]
    async fn add_item_creates_cart_lazily() {
        let (service, product_id) = setup(5).await;
        let user_id = UserId::new();

        let cart = service.add_item(user_id, product_id, 2).await.unwrap();
        assert_eq!(cart.version(), Version::first());
        assert_eq!(cart.total(), Money::from_cents(2_000));

        let loaded = service.get_cart(user_id).await.unwrap();
        assert_eq!(loaded, cart);
    }

    #[tokio::test]
    async fn add_item_unknown_product_is_not_found() {
        let (service, _) = setup(5).await;
        let err = service
            .add_item(UserId::new(), ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Product", .. }));
    }

    #[tokio::test]
    async fn get_cart_without_cart_is_not_found() {
        let (service, _) = setup(5).await;
        let err = service.get_cart(UserId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Cart", .. }));
    }

    #[tokio::test]
    async fn remove_item_without_cart_is_not_found() {
        let (service, product_id) = setup(5).await;
        let err = service
            .remove_item(UserId::new(), product_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Cart", .. }));
    }

    #[tokio::test]
    async fn remove_item_updates_total() {
        let (service, product_id) = setup(5).await;
        let user_id = UserId::new();
        service.add_item(user_id, product_id, 2).await.unwrap();

        let cart = service.remove_item(user_id, product_id).await.unwrap();
        assert!(cart.is_empty());
        assert!(cart.total().is_zero());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let (service, product_id) = setup(5).await;
        let user_id = UserId::new();

        service.clear(user_id).await.unwrap();

        service.add_item(user_id, product_id, 2).await.unwrap();
        service.clear(user_id).await.unwrap();
        service.clear(user_id).await.unwrap();

        let cart = service.get_cart(user_id).await.unwrap();
        assert!(cart.is_empty());
        assert!(cart.total().is_zero());
        assert_eq!(cart.version(), Version::new(2));
    }
}

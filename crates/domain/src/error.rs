//! Domain error types.

use common::{OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request is malformed or missing a required value.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist or is not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The user has no cart to check out.
    #[error("Cart not found or does not belong to the user.")]
    CartNotFound,

    /// The cart has no items to check out.
    #[error("Cart is empty.")]
    EmptyCart,

    /// The user has not placed any orders.
    #[error("No orders found for this user.")]
    NoOrders,

    /// A requested quantity exceeds the product's available stock.
    #[error("Insufficient stock for product {product_name}. Available: {available}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        available: u32,
    },

    /// The order status machine does not allow this edge.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// An error occurred in the store. Also carries a write that kept losing
    /// its concurrency check after being replayed.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short machine-readable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation",
            DomainError::NotFound { .. } => "not_found",
            DomainError::CartNotFound => "cart_not_found",
            DomainError::EmptyCart => "empty_cart",
            DomainError::NoOrders => "no_orders",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::Store(_) => "store",
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => DomainError::not_found("Product", id),
            StoreError::OrderNotFound(id) => DomainError::not_found("Order", id),
            StoreError::CartNotFound(_) => DomainError::CartNotFound,
            StoreError::InsufficientStock {
                product_id,
                available,
                ..
            } => DomainError::InsufficientStock {
                product_id,
                product_name: product_id.to_string(),
                available,
            },
            StoreError::QuantityOverflow(_) => {
                DomainError::Validation("Requested quantity is too large.".to_string())
            }
            other => DomainError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use common::OrderId;
    use store::Version;

    use super::*;

    #[test]
    fn unresolved_conflicts_stay_internal() {
        let err: DomainError = StoreError::ConcurrencyConflict {
            entity: "cart",
            id: "c1".to_string(),
            expected: Version::first(),
            actual: Version::new(2),
        }
        .into();
        assert!(matches!(err, DomainError::Store(_)));

        let err: DomainError = StoreError::StatusConflict {
            order_id: OrderId::new(),
            expected: OrderStatus::Pending,
            actual: OrderStatus::Confirmed,
        }
        .into();
        assert_eq!(err.kind(), "store");
    }

    #[test]
    fn quantity_overflow_is_validation() {
        let err: DomainError = StoreError::QuantityOverflow(ProductId::new()).into();
        assert!(matches!(err, DomainError::Validation(msg) if msg == "Requested quantity is too large."));
    }

    #[test]
    fn decode_errors_stay_internal() {
        let err: DomainError = StoreError::Decode("bad status".to_string()).into();
        assert!(matches!(err, DomainError::Store(_)));
    }

    #[test]
    fn messages_match_client_wording() {
        assert_eq!(DomainError::EmptyCart.to_string(), "Cart is empty.");
        let err = DomainError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Completed,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition from PENDING to COMPLETED"
        );
    }
}

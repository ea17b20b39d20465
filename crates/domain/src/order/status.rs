//! Order status machine.

use common::OrderStatus;
use store::{OrderRecord, StatusUpdate, StockDecrement};

use crate::error::DomainError;

use super::StockPolicy;

/// Result of a successful status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChangeOutcome {
    pub order: OrderRecord,
    /// The statuses the order may move to next.
    pub available_status_options: Vec<OrderStatus>,
}

impl StatusChangeOutcome {
    pub fn new(order: OrderRecord) -> Self {
        let available_status_options = order.status.allowed_transitions().to_vec();
        Self {
            order,
            available_status_options,
        }
    }
}

/// Validates a status change and describes the store write it needs.
///
/// Stock is decremented only when confirming under
/// [`StockPolicy::OnConfirmation`]. Every other edge leaves stock untouched.
pub fn plan_transition(
    order: &OrderRecord,
    to: OrderStatus,
    policy: StockPolicy,
) -> Result<StatusUpdate, DomainError> {
    if !order.status.can_transition_to(to) {
        return Err(DomainError::InvalidTransition {
            from: order.status,
            to,
        });
    }

    let decrements = if to == OrderStatus::Confirmed && policy.reserves_on_confirmation() {
        order
            .items
            .iter()
            .map(|item| StockDecrement {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(StatusUpdate {
        order_id: order.id,
        expected: order.status,
        new_status: to,
        decrements,
    })
}

//! Converting a cart into an order.

use common::{Money, OrderId, OrderStatus, ShippingDetailsId};
use store::{NewOrder, NewOrderItem};

use crate::cart::Cart;
use crate::error::DomainError;

/// Checks every cart line against the stock it was loaded with.
///
/// The first line that cannot be fulfilled determines the error.
pub fn check_stock(cart: &Cart) -> Result<(), DomainError> {
    for line in cart.lines() {
        let product = line.product();
        if product.is_deleted {
            return Err(DomainError::not_found("Product", product.id));
        }
        if line.quantity() > product.stock_qty {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                product_name: product.name.clone(),
                available: product.stock_qty,
            });
        }
    }
    Ok(())
}

/// Builds a pending order from the cart, copying each line's current price.
///
/// The order total is the sum of the copied line totals, so it agrees with
/// the items even if a price changed after the cart was last written.
/// Fails if a line total or the order total overflows.
pub fn snapshot_order(
    cart: &Cart,
    shipping_details_id: ShippingDetailsId,
) -> Result<NewOrder, DomainError> {
    let items = cart
        .lines()
        .iter()
        .map(|line| {
            let product = line.product();
            Some(NewOrderItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity(),
                sales_price: product.sales_price,
                mrp: product.mrp,
                line_total: line.checked_line_total()?,
            })
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(total_out_of_range)?;

    let total = Money::checked_sum(items.iter().map(|i| i.line_total))
        .ok_or_else(total_out_of_range)?;

    Ok(NewOrder {
        id: OrderId::new(),
        user_id: cart.user_id(),
        shipping_details_id,
        total,
        status: OrderStatus::Pending,
        items,
    })
}

fn total_out_of_range() -> DomainError {
    DomainError::Validation("Order total is out of range.".to_string())
}

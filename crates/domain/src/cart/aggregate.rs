//! Cart aggregate implementation.

use common::{CartId, Money, ProductId, UserId};
use store::{CartLineWrite, CartRecord, CartWrite, ProductRecord, Version};

use crate::error::DomainError;

/// One cart line, carrying the product row as it was when the cart was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    product: ProductRecord,
    quantity: u32,
}

impl CartLine {
    pub fn product(&self) -> &ProductRecord {
        &self.product
    }

    pub fn product_id(&self) -> ProductId {
        self.product.id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Current unit price times quantity.
    pub fn line_total(&self) -> Money {
        self.product.sales_price.multiply(self.quantity)
    }

    /// Like [`CartLine::line_total`], but `None` if the product overflows.
    pub fn checked_line_total(&self) -> Option<Money> {
        self.product.sales_price.checked_multiply(self.quantity)
    }
}

/// Sums the line totals, or `None` if any step overflows.
pub(crate) fn checked_total(lines: &[CartLine]) -> Option<Money> {
    lines
        .iter()
        .map(CartLine::checked_line_total)
        .collect::<Option<Vec<_>>>()
        .and_then(Money::checked_sum)
}

/// A user's shopping cart.
///
/// The total is never set directly. It is recomputed from the lines after
/// every mutation and when the cart is loaded, so it always reflects the
/// current product prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    user_id: UserId,
    version: Version,
    lines: Vec<CartLine>,
    total: Money,
}

impl Cart {
    /// Creates an empty, not yet persisted cart for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            version: Version::initial(),
            lines: Vec::new(),
            total: Money::zero(),
        }
    }

    /// Rebuilds a cart from its stored form.
    pub fn from_record(record: CartRecord) -> Self {
        let mut cart = Self {
            id: record.id,
            user_id: record.user_id,
            version: record.version,
            lines: record
                .items
                .into_iter()
                .map(|line| CartLine {
                    product: line.product,
                    quantity: line.quantity,
                })
                .collect(),
            total: Money::zero(),
        };
        cart.recompute_total();
        cart
    }

    /// Sets a product's quantity in the cart, adding a line if needed.
    ///
    /// An existing line has its quantity replaced, not incremented.
    pub fn add_item(&mut self, product: ProductRecord, quantity: u32) -> Result<(), DomainError> {
        ensure_positive_quantity(quantity)?;

        if product.is_deleted {
            return Err(DomainError::not_found("Product", product.id));
        }

        if quantity > product.stock_qty {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                product_name: product.name,
                available: product.stock_qty,
            });
        }

        let mut lines = self.lines.clone();
        match lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => {
                line.product = product;
                line.quantity = quantity;
            }
            None => lines.push(CartLine { product, quantity }),
        }
        if checked_total(&lines).is_none() {
            return Err(DomainError::Validation(
                "Cart total is out of range.".to_string(),
            ));
        }

        self.lines = lines;
        self.recompute_total();
        Ok(())
    }

    /// Removes a product's line from the cart.
    pub fn remove_item(&mut self, product_id: ProductId) -> Result<(), DomainError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product.id != product_id);
        if self.lines.len() == before {
            return Err(DomainError::not_found("Cart item", product_id));
        }

        self.recompute_total();
        Ok(())
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.recompute_total();
    }

    fn recompute_total(&mut self) {
        self.total = self.lines.iter().map(CartLine::line_total).sum();
    }

    /// Returns the state to persist.
    pub fn to_write(&self) -> CartWrite {
        CartWrite {
            id: self.id,
            user_id: self.user_id,
            total: self.total,
            lines: self
                .lines
                .iter()
                .map(|l| CartLineWrite {
                    product_id: l.product.id,
                    quantity: l.quantity,
                })
                .collect(),
        }
    }
}

// Query methods
impl Cart {
    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The version this cart was loaded at. Writes are checked against it.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn get_line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product.id == product_id)
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Rejects a zero quantity.
pub(crate) fn ensure_positive_quantity(quantity: u32) -> Result<(), DomainError> {
    if quantity == 0 {
        return Err(DomainError::Validation(
            "Product ID and valid quantity are required".to_string(),
        ));
    }
    Ok(())
}

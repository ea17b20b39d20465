//! When stock is taken from the shelf.

use std::str::FromStr;

use thiserror::Error;

/// The single point in an order's lifecycle where stock is decremented.
///
/// Exactly one policy is active per process, so each order item is
/// deducted at most once over the order's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StockPolicy {
    /// Stock is reserved when the order is placed. Confirmation does not touch stock.
    #[default]
    OnPlacement,
    /// Placement only checks stock. It is decremented when an admin confirms the order.
    OnConfirmation,
}

impl StockPolicy {
    pub fn reserves_on_placement(&self) -> bool {
        matches!(self, StockPolicy::OnPlacement)
    }

    pub fn reserves_on_confirmation(&self) -> bool {
        matches!(self, StockPolicy::OnConfirmation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockPolicy::OnPlacement => "on_placement",
            StockPolicy::OnConfirmation => "on_confirmation",
        }
    }
}

impl std::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown stock policy: {0} (expected on_placement or on_confirmation)")]
pub struct ParseStockPolicyError(pub String);

impl FromStr for StockPolicy {
    type Err = ParseStockPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "on_placement" => Ok(StockPolicy::OnPlacement),
            "on_confirmation" => Ok(StockPolicy::OnConfirmation),
            _ => Err(ParseStockPolicyError(s.to_string())),
        }
    }
}

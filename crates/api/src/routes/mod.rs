//! HTTP route handlers and their JSON shapes.

pub mod admin;
pub mod cart;
pub mod dto;
pub mod health;
pub mod metrics;
pub mod orders;

use domain::{CartService, OrderService};
use serde::Serialize;
use store::StorefrontStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: StorefrontStore> {
    pub cart_service: CartService<S>,
    pub order_service: OrderService<S>,
}

/// Success body: `{ "success": true, "message"?: ..., "data"?: ... }`.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

impl Envelope<()> {
    pub fn message(message: &'static str) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: None,
        }
    }
}

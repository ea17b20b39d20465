//! HTTP API server with observability for the storefront order core.
//!
//! Provides REST endpoints for the cart, checkout and admin order
//! management, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use domain::{CartService, OrderService, StockPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use store::StorefrontStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StorefrontStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/add-cart", post(routes::cart::add_item::<S>))
        .route("/cart/remove-item", delete(routes::cart::remove_item::<S>))
        .route("/cart/clear-cart", delete(routes::cart::clear::<S>))
        .route("/order/create-order", post(routes::orders::create::<S>))
        .route("/order/user", get(routes::orders::list_mine::<S>))
        .route("/order/{order_id}", get(routes::orders::get::<S>))
        .route("/admin/orders", get(routes::admin::list::<S>))
        .route(
            "/admin/orders/update-status",
            patch(routes::admin::update_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state, sharing one store between the services.
pub fn create_default_state<S: StorefrontStore + Clone + 'static>(
    store: S,
    stock_policy: StockPolicy,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        cart_service: CartService::new(store.clone()),
        order_service: OrderService::new(store, stock_policy),
    })
}

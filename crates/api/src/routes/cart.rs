//! Cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use common::ProductId;
use serde::Deserialize;
use store::StorefrontStore;

use super::dto::CartResponse;
use super::{AppState, Envelope};
use crate::auth::AuthUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Option<ProductId>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    pub product_id: Option<ProductId>,
}

/// GET /cart: the caller's cart with live product details.
#[tracing::instrument(skip(state))]
pub async fn get<S: StorefrontStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Envelope<CartResponse>>, ApiError> {
    let cart = state.cart_service.get_cart(user.user_id).await?;
    Ok(Json(Envelope::data(CartResponse::from(&cart))))
}

/// POST /cart/add-cart: set a product's quantity in the cart.
#[tracing::instrument(skip(state, body))]
pub async fn add_item<S: StorefrontStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    body: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<CartResponse>>), ApiError> {
    let Json(req) = body?;
    let (Some(product_id), Some(quantity)) = (req.product_id, req.quantity) else {
        return Err(ApiError::BadRequest(
            "Product ID and valid quantity are required".to_string(),
        ));
    };

    let cart = state
        .cart_service
        .add_item(user.user_id, product_id, quantity)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(
            Envelope::data(CartResponse::from(&cart))
                .with_message("Product added to cart successfully"),
        ),
    ))
}

/// DELETE /cart/remove-item: drop one product from the cart.
#[tracing::instrument(skip(state, body))]
pub async fn remove_item<S: StorefrontStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    body: Result<Json<RemoveFromCartRequest>, JsonRejection>,
) -> Result<Json<Envelope<CartResponse>>, ApiError> {
    let Json(req) = body?;
    let product_id = req
        .product_id
        .ok_or_else(|| ApiError::BadRequest("Product ID is required".to_string()))?;

    let cart = state
        .cart_service
        .remove_item(user.user_id, product_id)
        .await?;

    Ok(Json(
        Envelope::data(CartResponse::from(&cart))
            .with_message("Product removed from cart successfully"),
    ))
}

/// DELETE /cart/clear-cart: empty the cart. Succeeds even without a cart.
#[tracing::instrument(skip(state))]
pub async fn clear<S: StorefrontStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.cart_service.clear(user.user_id).await?;
    Ok(Json(Envelope::message("Cart has been cleared successfully")))
}

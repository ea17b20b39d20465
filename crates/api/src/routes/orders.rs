//! Customer order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ShippingDetailsId};
use serde::{Deserialize, Serialize};
use store::StorefrontStore;

use super::dto::OrderResponse;
use super::{AppState, Envelope};
use crate::auth::AuthUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_details_id: Option<ShippingDetailsId>,
}

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub success: bool,
    pub message: &'static str,
    pub order: OrderResponse,
}

/// POST /order/create-order: check out the caller's cart.
#[tracing::instrument(skip(state, body))]
pub async fn create<S: StorefrontStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let Json(req) = body?;
    let order = state
        .order_service
        .place_order(user.user_id, req.shipping_details_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            success: true,
            message: "Order created successfully.",
            order: order.into(),
        }),
    ))
}

/// GET /order/user: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_mine<S: StorefrontStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Envelope<Vec<OrderResponse>>>, ApiError> {
    let orders = state.order_service.orders_for_user(user.user_id).await?;
    Ok(Json(Envelope::data(
        orders.into_iter().map(Into::into).collect(),
    )))
}

/// GET /order/{orderId}: one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn get<S: StorefrontStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(order_id): Path<String>,
) -> Result<Json<Envelope<OrderResponse>>, ApiError> {
    let order_id = uuid::Uuid::parse_str(&order_id)
        .map(OrderId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;

    let order = state
        .order_service
        .order_for_user(user.user_id, order_id)
        .await?;
    Ok(Json(Envelope::data(order.into())))
}

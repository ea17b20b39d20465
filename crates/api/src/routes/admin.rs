//! Admin order endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use common::{OrderId, OrderStatus};
use serde::{Deserialize, Serialize};
use store::StorefrontStore;

use super::dto::OrderResponse;
use super::{AppState, Envelope};
use crate::auth::AdminUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub order_id: Option<OrderId>,
    pub new_status: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatedResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: OrderResponse,
    pub available_status_options: Vec<OrderStatus>,
}

/// GET /admin/orders: every order, keyed by user id.
#[tracing::instrument(skip(state))]
pub async fn list<S: StorefrontStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
) -> Result<Json<Envelope<BTreeMap<String, Vec<OrderResponse>>>>, ApiError> {
    let grouped = state
        .order_service
        .orders_grouped_by_user()
        .await?
        .into_iter()
        .map(|(user_id, orders)| {
            (
                user_id.to_string(),
                orders.into_iter().map(Into::into).collect(),
            )
        })
        .collect();
    Ok(Json(Envelope::data(grouped)))
}

/// PATCH /admin/orders/update-status: move an order along the status machine.
#[tracing::instrument(skip(state, body))]
pub async fn update_status<S: StorefrontStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusUpdatedResponse>, ApiError> {
    let Json(req) = body?;
    let (Some(order_id), Some(new_status)) = (req.order_id, req.new_status) else {
        return Err(ApiError::BadRequest(
            "orderId and newStatus are required".to_string(),
        ));
    };
    let new_status: OrderStatus = new_status
        .parse()
        .map_err(|e: common::ParseOrderStatusError| ApiError::BadRequest(e.to_string()))?;

    let outcome = state
        .order_service
        .change_status(order_id, new_status)
        .await?;

    tracing::info!(admin_id = %admin.user_id, %order_id, status = %new_status, "admin updated order status");

    Ok(Json(StatusUpdatedResponse {
        success: true,
        message: "Order status updated successfully",
        data: outcome.order.into(),
        available_status_options: outcome.available_status_options,
    }))
}

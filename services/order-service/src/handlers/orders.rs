use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::{CreateOrderCommand, DomainError, Order, OrderStatus};
use lifecycle::LifecycleError;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, MessageResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub message: String,
    pub payment_url: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

/// POST /orders
pub async fn create_order(
    State(state): State<AppState>,
    body: Result<Json<CreateOrderCommand>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    let Json(cmd) = body?;
    info!(client_id = %cmd.client_id, products = cmd.product_ids.len(), "Received create order request");

    let created = state.lifecycle.create_order(cmd).await?;

    info!(order_id = %created.order.id, "Order created successfully");
    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            message: "Order created successfully".to_string(),
            payment_url: created.payment_url,
        }),
    ))
}

/// GET /orders
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.lifecycle.list_orders().await?))
}

/// GET /orders/queue
pub async fn list_queue(State(state): State<AppState>) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.lifecycle.list_orders_by_status().await?))
}

/// GET /orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.lifecycle.find_order(&id).await?))
}

/// PATCH /orders/:id?status=
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let raw = query
        .status
        .ok_or_else(|| ApiError::BadRequest("status query parameter is required".to_string()))?;
    let status: OrderStatus = raw
        .parse()
        .map_err(|e| LifecycleError::Domain(DomainError::Order(e)))?;

    state.lifecycle.update_status(&id, status).await?;
    Ok(Json(MessageResponse::new("Order updated successfully")))
}

/// DELETE /orders/:id
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.lifecycle.delete_order(&id).await?;
    info!(order_id = %id, "Order deleted");
    Ok(Json(MessageResponse::new("Order deleted successfully")))
}

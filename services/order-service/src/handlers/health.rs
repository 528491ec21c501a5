use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub broker: String,
}

/// Health check endpoint. The HTTP API keeps serving while the broker
/// reconnects, so a lost broker only degrades the status.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let broker = state.broker_health.borrow().clone();
    let status = if broker.is_healthy() { "healthy" } else { "degraded" };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: status.to_string(),
            service: "order-service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            broker: broker.as_str().to_string(),
        }),
    )
}

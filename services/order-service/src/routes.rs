use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use common::metrics;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, orders};
use crate::state::AppState;

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, String::from("Failed to gather metrics"))
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics_handler))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/queue", get(orders::list_queue))
        .route(
            "/orders/:id",
            get(orders::get_order)
                .patch(orders::update_status)
                .delete(orders::delete_order),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use domain::events::queues;
    use domain::{Category, Order, OrderStatus, Product};
    use lifecycle::{GatewayError, OrderLifecycleService, PaymentGateway};
    use messaging::{BrokerHealth, EventPublisher, InMemoryBroker};
    use order_store::InMemoryOrderRepository;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::watch;
    use tower::ServiceExt;

    struct StubGateway {
        fail: bool,
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_payment(&self, order: &Order) -> Result<String, GatewayError> {
            if self.fail {
                Err(GatewayError::Status(500))
            } else {
                Ok(format!("https://pay/{}", order.id))
            }
        }
    }

    struct TestApp {
        router: Router,
        repository: InMemoryOrderRepository,
        broker: InMemoryBroker,
        _health: watch::Sender<BrokerHealth>,
    }

    fn app(gateway_fails: bool) -> TestApp {
        let repository = InMemoryOrderRepository::with_catalog(vec![Product {
            id: "p1".to_string(),
            name: "X-Burger".to_string(),
            description: String::new(),
            price: 20.0,
            category: Category {
                id: "lanche".to_string(),
                name: "Lanche".to_string(),
            },
        }]);
        let broker = InMemoryBroker::new();
        let lifecycle = OrderLifecycleService::new(
            Arc::new(repository.clone()),
            EventPublisher::new(Arc::new(broker.clone())),
        )
        .with_gateway(Arc::new(StubGateway { fail: gateway_fails }));
        let (health_tx, health_rx) = watch::channel(BrokerHealth::Healthy);

        TestApp {
            router: build_router(AppState::new(lifecycle, health_rx)),
            repository,
            broker,
            _health: health_tx,
        }
    }

    fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: id.to_string(),
            client_id: "c1".to_string(),
            status,
            products: vec![],
            price: 0.0,
        }
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_create_order() {
        let app = app(false);

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/orders",
            Some(json!({ "clientId": "c1", "productIds": ["p1", "p1"] })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Order created successfully");
        let published: Vec<Order> = app.broker.published_json(queues::NEW_ORDER);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].price, 40.0);
        assert_eq!(body["payment_url"], format!("https://pay/{}", published[0].id));
    }

    #[tokio::test]
    async fn test_create_order_gateway_failure() {
        let app = app(true);

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/orders",
            Some(json!({ "clientId": "c1", "productIds": ["p1"] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "failed to generate payment link");
        assert_eq!(app.repository.len(), 1);
    }

    #[tokio::test]
    async fn test_create_order_validation() {
        let app = app(false);

        let (status, _) = send(
            &app.router,
            Method::POST,
            "/orders",
            Some(json!({ "clientId": "c1", "productIds": [] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.repository.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_missing_field_is_bad_request() {
        let app = app(false);

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/orders",
            Some(json!({ "clientId": "c1" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("productIds"));
        assert!(app.repository.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_malformed_body_is_bad_request() {
        let app = app(false);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/orders")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["message"].is_string());
        assert!(app.broker.published(queues::NEW_ORDER).is_empty());
    }

    #[tokio::test]
    async fn test_get_order_and_not_found() {
        let app = app(false);
        app.repository.insert(order("o1", OrderStatus::Received));

        let (status, body) = send(&app.router, Method::GET, "/orders/o1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["clientId"], "c1");
        assert_eq!(body["status"], "RECEBIDO");

        let (status, body) = send(&app.router, Method::GET, "/orders/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Order not found");
    }

    #[tokio::test]
    async fn test_queue_route() {
        let app = app(false);
        app.repository.insert(order("a", OrderStatus::Received));
        app.repository.insert(order("b", OrderStatus::Ready));
        app.repository.insert(order("c", OrderStatus::AwaitingPayment));

        let (status, body) = send(&app.router, Method::GET, "/orders/queue", None).await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_patch_status() {
        let app = app(false);
        app.repository.insert(order("o1", OrderStatus::Received));

        let (status, body) = send(
            &app.router,
            Method::PATCH,
            "/orders/o1?status=em_preparacao",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Order updated successfully");
        assert_eq!(
            app.repository.status_updates(),
            vec![("o1".to_string(), OrderStatus::InPreparation)]
        );

        let (status, _) = send(&app.router, Method::PATCH, "/orders/o1?status=SHIPPED", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app.router, Method::PATCH, "/orders/o1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_order() {
        let app = app(false);
        app.repository.insert(order("o1", OrderStatus::Received));

        let (status, body) = send(&app.router, Method::DELETE, "/orders/o1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Order deleted successfully");

        let (status, _) = send(&app.router, Method::DELETE, "/orders/o1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let app = app(false);

        let (status, body) = send(&app.router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["broker"], "healthy");

        let response = app
            .router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

use domain::events::{queues, NewOrderEvent};
use domain::{CreateOrderCommand, DomainError, Order, OrderStatus, StatusChange};
use messaging::EventPublisher;
use order_store::OrderRepository;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::errors::{LifecycleError, Result};
use crate::gateway::{GatewayError, PaymentGateway};

/// A placed order together with the link the client pays through
#[derive(Debug, Clone, Serialize)]
pub struct CreatedOrder {
    pub order: Order,
    pub payment_url: String,
}

/// Order lifecycle: placement, payment link, status changes and deletion.
///
/// Without a gateway (see [`OrderLifecycleService::with_gateway`]) every
/// operation except `create_order` is available.
#[derive(Clone)]
pub struct OrderLifecycleService {
    repository: Arc<dyn OrderRepository>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    publisher: EventPublisher,
}

impl OrderLifecycleService {
    pub fn new(repository: Arc<dyn OrderRepository>, publisher: EventPublisher) -> Self {
        Self {
            repository,
            gateway: None,
            publisher,
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Place an order, request its payment link and announce it on `new_order`.
    ///
    /// Steps run in that order and nothing is rolled back: when the gateway
    /// fails the order stays persisted awaiting payment, and when the publish
    /// fails the payment link is still returned.
    #[instrument(skip(self, command), fields(client_id = %command.client_id))]
    pub async fn create_order(&self, command: CreateOrderCommand) -> Result<CreatedOrder> {
        let started = Instant::now();
        let result = self.place_and_request_payment(command).await;
        record("create_order", started, &result);
        result
    }

    async fn place_and_request_payment(&self, command: CreateOrderCommand) -> Result<CreatedOrder> {
        command.validate().map_err(DomainError::from)?;
        let gateway = self.gateway.as_ref().ok_or(GatewayError::NotConfigured)?;

        let created = self.repository.create(&command).await?;
        let order = self
            .repository
            .find_by_id(&created.id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(created.id.clone()))?;

        info!(order_id = %order.id, price = order.price, "Order persisted, requesting payment link");

        let payment_url = match gateway.create_payment(&order).await {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    error = %e,
                    "Payment link unavailable, order left awaiting payment"
                );
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .publisher
            .publish(queues::NEW_ORDER, &NewOrderEvent::from(order.clone()))
            .await
        {
            error!(order_id = %order.id, error = %e, "new_order event lost");
        }

        Ok(CreatedOrder { order, payment_url })
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.repository.find_all().await?)
    }

    pub async fn find_order(&self, id: &str) -> Result<Order> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    /// Kitchen queue: ready orders first, then in preparation, then received
    pub async fn list_orders_by_status(&self) -> Result<Vec<Order>> {
        let mut orders = self.repository.find_by_status(&OrderStatus::QUEUE).await?;
        orders.sort_by_key(|o| o.status.queue_rank());
        Ok(orders)
    }

    /// Set the status of an existing order.
    ///
    /// Any target status is accepted. Setting the current status again
    /// succeeds and reports a no-op change.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: &str, status: OrderStatus) -> Result<StatusChange> {
        let started = Instant::now();
        let result = self.apply_status(id, status).await;
        record("update_status", started, &result);
        result
    }

    async fn apply_status(&self, id: &str, status: OrderStatus) -> Result<StatusChange> {
        let order = self.find_order(id).await?;

        if !self.repository.update_status(id, status).await? {
            return Err(LifecycleError::NotFound(id.to_string()));
        }

        let change = order.status.transition(status);
        info!(
            order_id = %id,
            from = %change.from,
            to = %change.to,
            noop = change.is_noop(),
            "Order status updated"
        );
        Ok(change)
    }

    pub async fn delete_order(&self, id: &str) -> Result<()> {
        let started = Instant::now();
        let result = match self.repository.delete(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(LifecycleError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        };
        record("delete_order", started, &result);
        result
    }

    /// Remove every order of a client; zero deleted orders is still a success
    pub async fn delete_all_orders_by_client(&self, client_id: &str) -> Result<u64> {
        let started = Instant::now();
        let result = self
            .repository
            .delete_all_by_client(client_id)
            .await
            .map_err(LifecycleError::from);
        record("delete_all_orders_by_client", started, &result);

        if let Ok(deleted) = result {
            info!(client_id = %client_id, deleted, "Client orders deleted");
        }
        result
    }
}

fn record<T>(operation: &str, started: Instant, result: &Result<T>) {
    common::metrics::record_lifecycle(operation, result.is_ok(), started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockPaymentGateway;
    use domain::{Category, Product};
    use messaging::InMemoryBroker;
    use order_store::InMemoryOrderRepository;

    fn catalog() -> Vec<Product> {
        vec![
            Product {
                id: "p1".to_string(),
                name: "X-Burger".to_string(),
                description: String::new(),
                price: 25.0,
                category: Category {
                    id: "lanche".to_string(),
                    name: "Lanche".to_string(),
                },
            },
            Product {
                id: "p2".to_string(),
                name: "Refrigerante".to_string(),
                description: String::new(),
                price: 7.5,
                category: Category {
                    id: "bebida".to_string(),
                    name: "Bebida".to_string(),
                },
            },
        ]
    }

    struct Fixture {
        service: OrderLifecycleService,
        repository: InMemoryOrderRepository,
        broker: InMemoryBroker,
    }

    fn fixture(gateway: MockPaymentGateway) -> Fixture {
        let repository = InMemoryOrderRepository::with_catalog(catalog());
        let broker = InMemoryBroker::new();
        let service = OrderLifecycleService::new(
            Arc::new(repository.clone()),
            EventPublisher::new(Arc::new(broker.clone())),
        )
        .with_gateway(Arc::new(gateway));
        Fixture {
            service,
            repository,
            broker,
        }
    }

    fn command() -> CreateOrderCommand {
        CreateOrderCommand {
            client_id: "c1".to_string(),
            product_ids: vec!["p1".to_string(), "p2".to_string()],
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

    #[tokio::test]
    async fn test_create_order_returns_link_and_publishes() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment()
            .times(1)
            .returning(|order| Ok(format!("https://pay/{}", order.id)));
        let fx = fixture(gateway);

        let created = fx.service.create_order(command()).await.unwrap();

        assert_eq!(created.payment_url, format!("https://pay/{}", created.order.id));
        assert_eq!(created.order.status, OrderStatus::AwaitingPayment);
        assert_eq!(created.order.price, 32.5);

        let published: Vec<Order> = fx.broker.published_json(queues::NEW_ORDER);
        assert_eq!(published, vec![created.order]);
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_order() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment()
            .times(1)
            .returning(|_| Err(GatewayError::Status(500)));
        let fx = fixture(gateway);

        let err = fx.service.create_order(command()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::PaymentLink(_)));
        assert_eq!(err.user_message(), "failed to generate payment link");

        let orders = fx.service.list_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        let kept = fx.service.find_order(&orders[0].id).await.unwrap();
        assert_eq!(kept.status, OrderStatus::AwaitingPayment);
        assert!(fx.broker.published(queues::NEW_ORDER).is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_still_returns_link() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment()
            .returning(|_| Ok("https://pay/x".to_string()));
        let fx = fixture(gateway);
        fx.broker.fail_publishes(true);

        let created = fx.service.create_order(command()).await.unwrap();

        assert_eq!(created.payment_url, "https://pay/x");
        assert_eq!(fx.repository.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_command_touches_nothing() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment().never();
        let fx = fixture(gateway);

        let err = fx
            .service
            .create_order(CreateOrderCommand {
                client_id: "c1".to_string(),
                product_ids: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Domain(_)));
        assert!(fx.repository.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment().never();
        let fx = fixture(gateway);

        let err = fx
            .service
            .create_order(CreateOrderCommand {
                client_id: "c1".to_string(),
                product_ids: vec!["p404".to_string()],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Domain(_)));
    }

    #[tokio::test]
    async fn test_create_without_gateway_persists_nothing() {
        let repository = InMemoryOrderRepository::with_catalog(catalog());
        let service = OrderLifecycleService::new(
            Arc::new(repository.clone()),
            EventPublisher::new(Arc::new(InMemoryBroker::new())),
        );

        let err = service.create_order(command()).await.unwrap_err();

        assert!(matches!(err, LifecycleError::PaymentLink(GatewayError::NotConfigured)));
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_update_status_reports_change() {
        let fx = fixture(MockPaymentGateway::new());
        fx.repository.insert(order("o1", OrderStatus::AwaitingPayment));

        let change = fx.service.update_status("o1", OrderStatus::Received).await.unwrap();
        assert_eq!(change.from, OrderStatus::AwaitingPayment);
        assert_eq!(change.to, OrderStatus::Received);

        let again = fx.service.update_status("o1", OrderStatus::Received).await.unwrap();
        assert!(again.is_noop());
        assert_eq!(
            fx.service.find_order("o1").await.unwrap().status,
            OrderStatus::Received
        );
    }

    #[tokio::test]
    async fn test_update_status_of_missing_order() {
        let fx = fixture(MockPaymentGateway::new());

        let err = fx
            .service
            .update_status("nope", OrderStatus::Received)
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::NotFound(id) if id == "nope"));
        assert!(fx.repository.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_update_status_repository_failure() {
        let fx = fixture(MockPaymentGateway::new());
        fx.repository.insert(order("o1", OrderStatus::AwaitingPayment));
        fx.repository.fail_requests(true);

        let err = fx
            .service
            .update_status("o1", OrderStatus::Received)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Repository(_)));
    }

    #[tokio::test]
    async fn test_queue_listing_order() {
        let fx = fixture(MockPaymentGateway::new());
        fx.repository.insert(order("received", OrderStatus::Received));
        fx.repository.insert(order("waiting", OrderStatus::AwaitingPayment));
        fx.repository.insert(order("preparing", OrderStatus::InPreparation));
        fx.repository.insert(order("done", OrderStatus::Finished));
        fx.repository.insert(order("ready", OrderStatus::Ready));
        fx.repository.insert(order("cancelled", OrderStatus::Cancelled));

        let ids: Vec<String> = fx
            .service
            .list_orders_by_status()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();

        assert_eq!(ids, vec!["ready", "preparing", "received"]);
    }

    #[tokio::test]
    async fn test_delete_order() {
        let fx = fixture(MockPaymentGateway::new());
        fx.repository.insert(order("o1", OrderStatus::Received));

        fx.service.delete_order("o1").await.unwrap();
        assert!(matches!(
            fx.service.delete_order("o1").await,
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_all_orders_by_client() {
        let fx = fixture(MockPaymentGateway::new());
        fx.repository.insert(order("o1", OrderStatus::Received));
        fx.repository.insert(order("o2", OrderStatus::Ready));

        assert_eq!(fx.service.delete_all_orders_by_client("c1").await.unwrap(), 2);
        assert_eq!(fx.service.delete_all_orders_by_client("c1").await.unwrap(), 0);
    }
}

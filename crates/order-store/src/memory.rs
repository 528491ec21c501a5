use async_trait::async_trait;
use domain::{CreateOrderCommand, Order, OrderStatus, Product};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{OrderRepository, OrderStoreError};

#[derive(Default)]
struct State {
    catalog: Vec<Product>,
    orders: Vec<Order>,
    status_updates: Vec<(String, OrderStatus)>,
}

/// Process-local repository used by tests and local runs.
///
/// Keeps insertion order, records every `update_status` call, and can be
/// switched into a failing mode to exercise error paths.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<Mutex<State>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(products: Vec<Product>) -> Self {
        let repository = Self::new();
        repository.state().catalog = products;
        repository
    }

    /// Store an order as-is, bypassing placement
    pub fn insert(&self, order: Order) {
        let mut state = self.state();
        state.orders.retain(|o| o.id != order.id);
        state.orders.push(order);
    }

    /// Make every call fail with [`OrderStoreError::Unavailable`]
    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every `update_status` call seen so far, including ones for unknown orders
    pub fn status_updates(&self) -> Vec<(String, OrderStatus)> {
        self.state().status_updates.clone()
    }

    pub fn len(&self) -> usize {
        self.state().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), OrderStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(OrderStoreError::Unavailable("in-memory store set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, command: &CreateOrderCommand) -> Result<Order, OrderStoreError> {
        self.check()?;
        let mut state = self.state();
        let order = Order::place(command.client_id.clone(), &command.product_ids, &state.catalog)?;
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn find_all(&self) -> Result<Vec<Order>, OrderStoreError> {
        self.check()?;
        Ok(self.state().orders.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, OrderStoreError> {
        self.check()?;
        Ok(self.state().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, OrderStoreError> {
        self.check()?;
        Ok(self
            .state()
            .orders
            .iter()
            .filter(|o| statuses.contains(&o.status))
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: &str, status: OrderStatus) -> Result<bool, OrderStoreError> {
        self.check()?;
        let mut state = self.state();
        state.status_updates.push((id.to_string(), status));
        match state.orders.iter_mut().find(|o| o.id == id) {
            Some(order) => {
                order.apply_status(status);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, OrderStoreError> {
        self.check()?;
        let mut state = self.state();
        let before = state.orders.len();
        state.orders.retain(|o| o.id != id);
        Ok(state.orders.len() < before)
    }

    async fn delete_all_by_client(&self, client_id: &str) -> Result<u64, OrderStoreError> {
        self.check()?;
        let mut state = self.state();
        let before = state.orders.len();
        state.orders.retain(|o| o.client_id != client_id);
        Ok((before - state.orders.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Category, OrderError};

    fn catalog() -> Vec<Product> {
        ["p1", "p2"]
            .iter()
            .enumerate()
            .map(|(i, id)| Product {
                id: id.to_string(),
                name: format!("Product {}", id),
                description: String::new(),
                price: 10.0 * (i as f64 + 1.0),
                category: Category {
                    id: "lanche".to_string(),
                    name: "Lanche".to_string(),
                },
            })
            .collect()
    }

    fn command(client_id: &str, product_ids: &[&str]) -> CreateOrderCommand {
        CreateOrderCommand {
            client_id: client_id.to_string(),
            product_ids: product_ids.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_places_order_from_catalog() {
        let repository = InMemoryOrderRepository::with_catalog(catalog());

        let order = repository.create(&command("c1", &["p1", "p2"])).await.unwrap();

        assert_eq!(order.status, OrderStatus::AwaitingPayment);
        assert_eq!(order.price, 30.0);
        assert_eq!(repository.find_by_id(&order.id).await.unwrap(), Some(order));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_product() {
        let repository = InMemoryOrderRepository::with_catalog(catalog());

        let result = repository.create(&command("c1", &["p9"])).await;

        assert!(matches!(
            result,
            Err(OrderStoreError::Order(OrderError::UnknownProduct(id))) if id == "p9"
        ));
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_update_status_is_idempotent() {
        let repository = InMemoryOrderRepository::with_catalog(catalog());
        let order = repository.create(&command("c1", &["p1"])).await.unwrap();

        assert!(repository.update_status(&order.id, OrderStatus::Received).await.unwrap());
        assert!(repository.update_status(&order.id, OrderStatus::Received).await.unwrap());
        assert!(!repository.update_status("missing", OrderStatus::Received).await.unwrap());

        let stored = repository.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Received);
        assert_eq!(repository.status_updates().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_all_by_client_counts_and_repeats() {
        let repository = InMemoryOrderRepository::with_catalog(catalog());
        repository.create(&command("c1", &["p1"])).await.unwrap();
        repository.create(&command("c1", &["p2"])).await.unwrap();
        repository.create(&command("c2", &["p1"])).await.unwrap();

        assert_eq!(repository.delete_all_by_client("c1").await.unwrap(), 2);
        assert_eq!(repository.delete_all_by_client("c1").await.unwrap(), 0);
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let repository = InMemoryOrderRepository::with_catalog(catalog());
        repository.fail_requests(true);

        assert!(matches!(
            repository.find_all().await,
            Err(OrderStoreError::Unavailable(_))
        ));
    }
}

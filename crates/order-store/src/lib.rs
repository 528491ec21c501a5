pub mod memory;
pub mod postgres;

pub use memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;

use async_trait::async_trait;
use domain::{CreateOrderCommand, Order, OrderError, OrderStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Stored order {id} is unreadable: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for orders.
///
/// Each call is atomic on its own; nothing spans several calls.
/// `update_status` and `delete_all_by_client` are idempotent: repeating them
/// yields the same success result.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Resolve the requested products and persist a new order awaiting payment
    async fn create(&self, command: &CreateOrderCommand) -> Result<Order, OrderStoreError>;

    async fn find_all(&self) -> Result<Vec<Order>, OrderStoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, OrderStoreError>;

    /// Orders whose status is one of `statuses`, in no particular order
    async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, OrderStoreError>;

    /// Set the status of one order; `false` when no such order exists
    async fn update_status(&self, id: &str, status: OrderStatus) -> Result<bool, OrderStoreError>;

    /// Delete one order; `false` when no such order exists
    async fn delete(&self, id: &str) -> Result<bool, OrderStoreError>;

    /// Delete every order of a client and return how many were removed
    async fn delete_all_by_client(&self, client_id: &str) -> Result<u64, OrderStoreError>;
}

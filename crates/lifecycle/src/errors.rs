use domain::DomainError;
use order_store::OrderStoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

pub const PAYMENT_LINK_FAILED: &str = "failed to generate payment link";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Payment link request failed: {0}")]
    PaymentLink(#[from] GatewayError),

    #[error("Repository error: {0}")]
    Repository(OrderStoreError),
}

impl From<OrderStoreError> for LifecycleError {
    fn from(err: OrderStoreError) -> Self {
        match err {
            // Unknown products are the caller's mistake, not a storage failure
            OrderStoreError::Order(e) => LifecycleError::Domain(DomainError::Order(e)),
            other => LifecycleError::Repository(other),
        }
    }
}

impl LifecycleError {
    /// Message safe to hand back to API callers
    pub fn user_message(&self) -> String {
        match self {
            LifecycleError::Domain(e) => e.to_string(),
            LifecycleError::NotFound(_) => "Order not found".to_string(),
            LifecycleError::PaymentLink(_) => PAYMENT_LINK_FAILED.to_string(),
            LifecycleError::Repository(_) => "Internal server error".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

use super::{queues, QueueMessage};
use crate::aggregates::order::{OrderId, OrderStatus};
use serde::{Deserialize, Serialize};

/// Gateway status that marks a payment as settled
pub const APPROVED: &str = "approved";

/// Payment gateway callback relayed on `payment_update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    /// Order id as known to the gateway
    pub external_reference: OrderId,
    pub status: String,
}

impl PaymentUpdate {
    pub fn is_approved(&self) -> bool {
        self.status == APPROVED
    }

    /// `approved` settles the order; every other gateway status keeps it
    /// waiting for payment.
    pub fn target_status(&self) -> OrderStatus {
        if self.is_approved() {
            OrderStatus::Received
        } else {
            OrderStatus::AwaitingPayment
        }
    }

    /// Deterministic key for spotting redeliveries of the same outcome
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.external_reference, self.target_status())
    }
}

impl QueueMessage for PaymentUpdate {
    fn queue() -> &'static str {
        queues::PAYMENT_UPDATE
    }
}

pub mod lgpd_events;
pub mod order_events;
pub mod payment_events;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Durable queue names shared by the order service and its consumers
pub mod queues {
    pub const NEW_ORDER: &str = "new_order";
    pub const PAYMENT_UPDATE: &str = "payment_update";
    pub const LGPD_EXECUTION: &str = "lgpd_execution";
    pub const LGPD_CONCLUSION: &str = "lgpd_conclusion";

    pub const ALL: [&str; 4] = [NEW_ORDER, PAYMENT_UPDATE, LGPD_EXECUTION, LGPD_CONCLUSION];
}

/// A JSON message carried on a single queue.
///
/// Every message is self-contained: decoding one never depends on any
/// message delivered before it.
pub trait QueueMessage: Serialize + DeserializeOwned {
    /// Queue the message travels on
    fn queue() -> &'static str;

    fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

pub use lgpd_events::{LgpdConclusion, LgpdExecutionRequest, LgpdExecutionStatus};
pub use order_events::NewOrderEvent;
pub use payment_events::{PaymentUpdate, APPROVED};

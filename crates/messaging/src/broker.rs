use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::consumer::{ConsumerHandle, MessageHandler};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Failed to connect to broker: {0}")]
    Connection(String),

    #[error("Broker is not connected")]
    NotConnected,

    #[error("Failed to declare queue '{queue}': {reason}")]
    Declare { queue: String, reason: String },

    #[error("Failed to publish to queue '{queue}': {reason}")]
    Publish { queue: String, reason: String },

    #[error("Failed to consume from queue '{queue}': {reason}")]
    Consume { queue: String, reason: String },

    #[error("Failed to acknowledge delivery: {0}")]
    Acknowledge(String),

    #[error("Connection closed: {0}")]
    Closed(String),
}

/// Queue operations shared by every broker implementation.
///
/// A single implementation instance owns one connection and one channel;
/// publishes and consumer registrations issued through it share that channel.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Declare a queue that survives broker restarts. Idempotent.
    async fn declare_durable_queue(&self, queue: &str) -> Result<(), BrokerError>;

    /// Fire a payload at a queue without waiting for a delivery confirmation
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Run `handler` for each delivery on `queue`, one message at a time
    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<ConsumerHandle, BrokerError>;
}

/// Lifecycle of the underlying connection
#[async_trait]
pub trait BrokerConnection: MessageBroker {
    /// Resolves once the connection has been lost
    async fn closed(&self) -> BrokerError;

    /// Close the channel, then the connection
    async fn close(&self) -> Result<(), BrokerError>;
}

/// Settles a single delivery with the broker
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;

    async fn nack_requeue(&self) -> Result<(), BrokerError>;
}

/// A message held in flight until it is acked or nacked
pub struct Delivery {
    pub queue: String,
    pub payload: Vec<u8>,
    pub redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        queue: String,
        payload: Vec<u8>,
        redelivered: bool,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            queue,
            payload,
            redelivered,
            acker,
        }
    }

    pub async fn ack(&self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    pub async fn nack_requeue(&self) -> Result<(), BrokerError> {
        self.acker.nack_requeue().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("queue", &self.queue)
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

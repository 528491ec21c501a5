use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::broker::{BrokerError, MessageBroker};

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    PublishFailed(#[from] BrokerError),
}

/// Publishes JSON messages through a shared broker handle
#[derive(Clone)]
pub struct EventPublisher {
    broker: Arc<dyn MessageBroker>,
}

impl EventPublisher {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self { broker }
    }

    /// Serialize `message` as JSON and publish it to `queue`.
    ///
    /// The call returns once the broker accepted the frame. A failure is
    /// reported to the caller and never undoes state the caller already
    /// committed.
    pub async fn publish<T: Serialize>(&self, queue: &str, message: &T) -> Result<(), PublisherError> {
        let payload = serde_json::to_vec(message)?;

        match self.broker.publish(queue, &payload).await {
            Ok(()) => {
                common::metrics::record_publish(queue, true);
                info!(queue = %queue, bytes = payload.len(), "Message published");
                Ok(())
            }
            Err(e) => {
                common::metrics::record_publish(queue, false);
                warn!(queue = %queue, error = %e, "Failed to publish message");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestMessage {
        id: String,
    }

    #[tokio::test]
    async fn test_publish_serializes_json() {
        let broker = InMemoryBroker::new();
        let publisher = EventPublisher::new(Arc::new(broker.clone()));

        publisher
            .publish("test", &TestMessage { id: "o1".to_string() })
            .await
            .unwrap();

        let published: Vec<TestMessage> = broker.published_json("test");
        assert_eq!(published, vec![TestMessage { id: "o1".to_string() }]);
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported() {
        let broker = InMemoryBroker::new();
        broker.fail_publishes(true);
        let publisher = EventPublisher::new(Arc::new(broker.clone()));

        let result = publisher
            .publish("test", &TestMessage { id: "o1".to_string() })
            .await;

        assert!(matches!(result, Err(PublisherError::PublishFailed(_))));
        assert!(broker.published("test").is_empty());
    }
}

use async_trait::async_trait;
use domain::events::{queues, LgpdConclusion, LgpdExecutionRequest, QueueMessage};
use lifecycle::OrderLifecycleService;
use messaging::{EventPublisher, HandlerError, MessageHandler};
use tracing::{error, info, warn};

use crate::error::ConsumerError;

/// Erases a client's orders on request and reports the outcome on
/// `lgpd_conclusion`.
///
/// Every request gets exactly one reply. A failed deletion replies FAILED
/// and the request is settled; the requester decides whether to ask again.
/// A reply that cannot be published requeues the request, and the repeated
/// deletion is a no-op for orders already removed.
pub struct LgpdDeletionConsumer {
    lifecycle: OrderLifecycleService,
    publisher: EventPublisher,
}

impl LgpdDeletionConsumer {
    pub fn new(lifecycle: OrderLifecycleService, publisher: EventPublisher) -> Self {
        Self {
            lifecycle,
            publisher,
        }
    }

    async fn process(&self, payload: &[u8]) -> Result<(), ConsumerError> {
        let request = LgpdExecutionRequest::from_payload(payload)?;

        if !request.exclude {
            info!(client_id = %request.id, "Deletion not requested, nothing to do");
            return Ok(());
        }

        match self.lifecycle.delete_all_orders_by_client(&request.id).await {
            Ok(deleted) => {
                self.publisher
                    .publish(queues::LGPD_CONCLUSION, &LgpdConclusion::success(request.id.clone()))
                    .await?;
                info!(client_id = %request.id, deleted, "Client data erased");
                Ok(())
            }
            Err(e) => {
                warn!(client_id = %request.id, error = %e, "Client data erasure failed");
                self.publisher
                    .publish(queues::LGPD_CONCLUSION, &LgpdConclusion::failed())
                    .await
                    .map_err(|publish_err| {
                        error!(
                            client_id = %request.id,
                            error = %publish_err,
                            "Failed to report erasure failure, requeueing"
                        );
                        publish_err
                    })?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MessageHandler for LgpdDeletionConsumer {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        Ok(self.process(payload).await?)
    }
}

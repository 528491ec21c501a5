use async_trait::async_trait;
use domain::events::{PaymentUpdate, QueueMessage};
use lifecycle::OrderLifecycleService;
use messaging::{HandlerError, MessageHandler};
use tracing::{info, info_span, warn, Instrument};

use crate::error::ConsumerError;

/// Applies payment gateway callbacks from `payment_update` to orders.
///
/// `approved` moves the order to RECEBIDO, any other status back to
/// AGUARDANDO_PAGAMENTO. Redelivered callbacks set the same status again.
pub struct PaymentWebhookConsumer {
    lifecycle: OrderLifecycleService,
}

impl PaymentWebhookConsumer {
    pub fn new(lifecycle: OrderLifecycleService) -> Self {
        Self { lifecycle }
    }

    async fn process(&self, payload: &[u8]) -> Result<(), ConsumerError> {
        let update = PaymentUpdate::from_payload(payload).map_err(|e| {
            warn!(error = %e, "Undecodable payment update, requeueing");
            e
        })?;

        let target = update.target_status();
        let span = info_span!(
            "payment_update",
            dedup_key = %update.dedup_key(),
            order_id = %update.external_reference,
            gateway_status = %update.status,
        );

        async {
            let change = self
                .lifecycle
                .update_status(&update.external_reference, target)
                .await?;
            info!(from = %change.from, to = %change.to, "Payment update applied");
            Ok::<(), ConsumerError>(())
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl MessageHandler for PaymentWebhookConsumer {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        Ok(self.process(payload).await?)
    }
}

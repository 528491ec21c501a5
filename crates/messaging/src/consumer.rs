use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::broker::{BrokerError, Delivery};

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Business logic invoked once per delivered message
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError>;
}

/// How a delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acked,
    Requeued,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Acked => "acked",
            Outcome::Requeued => "requeued",
        }
    }
}

/// Run the handler for one delivery and settle it.
///
/// Success acks the message. An error or a panic inside the handler nacks it
/// with requeue, so the broker delivers it again. Failures stay local to the
/// delivery; only a failed ack/nack is returned, since it means the channel
/// is gone.
pub async fn dispatch(
    handler: &dyn MessageHandler,
    delivery: Delivery,
) -> Result<Outcome, BrokerError> {
    let started = Instant::now();
    let result = AssertUnwindSafe(handler.handle(&delivery.payload))
        .catch_unwind()
        .await;

    let outcome = match result {
        Ok(Ok(())) => {
            delivery.ack().await?;
            debug!(queue = %delivery.queue, "Message acknowledged");
            Outcome::Acked
        }
        Ok(Err(e)) => {
            warn!(
                queue = %delivery.queue,
                redelivered = delivery.redelivered,
                error = %e,
                "Handler failed, requeueing message"
            );
            delivery.nack_requeue().await?;
            Outcome::Requeued
        }
        Err(_) => {
            error!(
                queue = %delivery.queue,
                redelivered = delivery.redelivered,
                "Handler panicked, requeueing message"
            );
            delivery.nack_requeue().await?;
            Outcome::Requeued
        }
    };

    common::metrics::record_message(
        &delivery.queue,
        outcome.as_str(),
        started.elapsed().as_secs_f64(),
    );

    Ok(outcome)
}

/// Running consume loop for one queue
#[derive(Debug)]
pub struct ConsumerHandle {
    queue: String,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn new(queue: String, task: JoinHandle<()>) -> Self {
        Self { queue, task }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    /// Resolves once the consume loop has ended and yields its queue.
    /// The handle must not be awaited again afterwards.
    pub async fn stopped(&mut self) -> String {
        if let Err(e) = (&mut self.task).await {
            if e.is_panic() {
                error!(queue = %self.queue, "Consumer task panicked");
            }
        }
        self.queue.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Acknowledger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingAcker {
        acks: Arc<AtomicUsize>,
        nacks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Acknowledger for CountingAcker {
        async fn ack(&self) -> Result<(), BrokerError> {
            self.acks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn nack_requeue(&self) -> Result<(), BrokerError> {
            self.nacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingAcker;

    #[async_trait]
    impl Acknowledger for FailingAcker {
        async fn ack(&self) -> Result<(), BrokerError> {
            Err(BrokerError::Acknowledge("channel closed".to_string()))
        }

        async fn nack_requeue(&self) -> Result<(), BrokerError> {
            Err(BrokerError::Acknowledge("channel closed".to_string()))
        }
    }

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    struct TestHandler(Behaviour);

    #[async_trait]
    impl MessageHandler for TestHandler {
        async fn handle(&self, _payload: &[u8]) -> Result<(), HandlerError> {
            match self.0 {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err("boom".into()),
                Behaviour::Panic => panic!("handler panicked"),
            }
        }
    }

    fn delivery(acker: impl Acknowledger + 'static) -> Delivery {
        Delivery::new("test".to_string(), b"{}".to_vec(), false, Box::new(acker))
    }

    #[tokio::test]
    async fn test_success_acks() {
        let acker = CountingAcker::default();
        let (acks, nacks) = (acker.acks.clone(), acker.nacks.clone());

        let outcome = dispatch(&TestHandler(Behaviour::Succeed), delivery(acker))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Acked);
        assert_eq!(acks.load(Ordering::SeqCst), 1);
        assert_eq!(nacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_requeues() {
        let acker = CountingAcker::default();
        let (acks, nacks) = (acker.acks.clone(), acker.nacks.clone());

        let outcome = dispatch(&TestHandler(Behaviour::Fail), delivery(acker))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Requeued);
        assert_eq!(acks.load(Ordering::SeqCst), 0);
        assert_eq!(nacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_panic_requeues() {
        let acker = CountingAcker::default();
        let nacks = acker.nacks.clone();

        let outcome = dispatch(&TestHandler(Behaviour::Panic), delivery(acker))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Requeued);
        assert_eq!(nacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_ack_is_returned() {
        let result = dispatch(&TestHandler(Behaviour::Succeed), delivery(FailingAcker)).await;
        assert!(matches!(result, Err(BrokerError::Acknowledge(_))));
    }
}

use async_trait::async_trait;
use futures_util::future::select_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};

use crate::broker::{BrokerConnection, BrokerError, MessageBroker};
use crate::consumer::{ConsumerHandle, MessageHandler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerHealth {
    Connecting,
    Healthy,
    Reconnecting { attempt: u32 },
    Stopped,
}

impl BrokerHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, BrokerHealth::Healthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerHealth::Connecting => "connecting",
            BrokerHealth::Healthy => "healthy",
            BrokerHealth::Reconnecting { .. } => "reconnecting",
            BrokerHealth::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Give up after this many consecutive failed attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl SupervisorConfig {
    /// Exponential backoff for the given attempt (1-based), capped at `max_backoff`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Keeps a broker connection alive across broker restarts.
///
/// [`SupervisedBroker::run`] connects, runs `setup` (queue declarations and
/// consumer registrations) and then waits for the connection to drop or for
/// any consumer returned by `setup` to stop. Either way the connection is
/// discarded and the whole connect/setup sequence is replayed after a backoff. The
/// supervisor itself implements [`MessageBroker`], delegating to the live
/// connection; calls made while disconnected fail with
/// [`BrokerError::NotConnected`].
pub struct SupervisedBroker<B> {
    config: SupervisorConfig,
    current: RwLock<Option<Arc<B>>>,
    health: watch::Sender<BrokerHealth>,
}

impl<B> SupervisedBroker<B>
where
    B: BrokerConnection + 'static,
{
    pub fn new(config: SupervisorConfig) -> Arc<Self> {
        let (health, _) = watch::channel(BrokerHealth::Connecting);
        Arc::new(Self {
            config,
            current: RwLock::new(None),
            health,
        })
    }

    pub fn health(&self) -> watch::Receiver<BrokerHealth> {
        self.health.subscribe()
    }

    pub fn current_health(&self) -> BrokerHealth {
        self.health.borrow().clone()
    }

    /// Supervise until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Returns an error only when `max_attempts` consecutive attempts failed.
    pub async fn run<C, CF, S, SF>(
        &self,
        connect: C,
        setup: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), BrokerError>
    where
        C: Fn() -> CF,
        CF: Future<Output = Result<B, BrokerError>>,
        S: Fn(Arc<dyn MessageBroker>) -> SF,
        SF: Future<Output = Result<Vec<ConsumerHandle>, BrokerError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let last_error = match connect().await {
                Ok(broker) => {
                    let broker = Arc::new(broker);
                    match setup(broker.clone() as Arc<dyn MessageBroker>).await {
                        Ok(mut consumers) => {
                            attempt = 0;
                            *self.current.write().await = Some(broker.clone());
                            self.health.send_replace(BrokerHealth::Healthy);
                            info!(consumers = consumers.len(), "Broker connection is healthy");

                            let interruption = tokio::select! {
                                lost = broker.closed() => Interruption::Lost(lost),
                                queue = first_stopped(&mut consumers) => Interruption::ConsumerStopped(queue),
                                _ = shutdown_requested(&mut shutdown) => Interruption::Shutdown,
                            };

                            for consumer in &consumers {
                                consumer.abort();
                            }

                            match interruption {
                                Interruption::Shutdown => break,
                                Interruption::Lost(lost) => {
                                    *self.current.write().await = None;
                                    warn!(error = %lost, "Broker connection lost, reconnecting");
                                    lost
                                }
                                Interruption::ConsumerStopped(queue) => {
                                    *self.current.write().await = None;
                                    warn!(queue = %queue, "Consumer stopped, reconnecting");
                                    if let Err(e) = broker.close().await {
                                        warn!(error = %e, "Failed to close broker after consumer stopped");
                                    }
                                    BrokerError::Consume {
                                        queue,
                                        reason: "consumer stopped".to_string(),
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Broker setup failed");
                            if let Err(close_err) = broker.close().await {
                                warn!(error = %close_err, "Failed to close half-configured broker");
                            }
                            e
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Broker connection attempt failed");
                    e
                }
            };

            attempt += 1;
            if let Some(max) = self.config.max_attempts {
                if attempt >= max {
                    error!(attempts = attempt, "Giving up on broker connection");
                    self.health.send_replace(BrokerHealth::Stopped);
                    return Err(last_error);
                }
            }

            self.health
                .send_replace(BrokerHealth::Reconnecting { attempt });
            let delay = self.config.backoff(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "Waiting before reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Close the live connection, channel first
    pub async fn shutdown(&self) {
        let current = self.current.write().await.take();
        if let Some(broker) = current {
            info!("Closing broker connection");
            if let Err(e) = broker.close().await {
                warn!(error = %e, "Failed to close broker connection cleanly");
            }
        }
        self.health.send_replace(BrokerHealth::Stopped);
    }

    async fn live(&self) -> Result<Arc<B>, BrokerError> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(BrokerError::NotConnected)
    }
}

enum Interruption {
    Lost(BrokerError),
    ConsumerStopped(String),
    Shutdown,
}

/// Resolves with the queue of the first consumer whose loop ends; never
/// resolves when there are no consumers
async fn first_stopped(consumers: &mut [ConsumerHandle]) -> String {
    if consumers.is_empty() {
        return std::future::pending().await;
    }
    let (queue, _, _) = select_all(consumers.iter_mut().map(|c| Box::pin(c.stopped()))).await;
    queue
}

/// Resolves once shutdown is requested or its sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl<B> MessageBroker for SupervisedBroker<B>
where
    B: BrokerConnection + 'static,
{
    async fn declare_durable_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.live().await?.declare_durable_queue(queue).await
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.live().await?.publish(queue, payload).await
    }

    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<ConsumerHandle, BrokerError> {
        self.live().await?.consume(queue, handler).await
    }
}

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};
use tracing::debug;

use crate::broker::{Acknowledger, BrokerConnection, BrokerError, Delivery, MessageBroker};
use crate::consumer::{dispatch, ConsumerHandle, MessageHandler, Outcome};

#[derive(Debug, Clone)]
struct StoredMessage {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct Inner {
    queues: Mutex<HashMap<String, VecDeque<StoredMessage>>>,
    durable: Mutex<HashSet<String>>,
    cancelled: Mutex<HashSet<String>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    acks: AtomicUsize,
    nacks: AtomicUsize,
    fail_publishes: AtomicBool,
    arrivals: Notify,
}

/// Broker kept entirely in memory.
///
/// Behaves like a single RabbitMQ channel: FIFO queues, manual ack, and a
/// nacked message goes back to the head of its queue flagged as redelivered.
/// Every publish is recorded and ack/nack calls are counted so tests can
/// assert on them.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
    closed: Arc<watch::Sender<Option<String>>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner::default()),
            closed: Arc::new(closed),
        }
    }

    /// Deliver the head of `queue` to `handler` and settle it.
    /// Returns `None` when the queue is empty.
    pub async fn deliver_next(&self, queue: &str, handler: &dyn MessageHandler) -> Option<Outcome> {
        let message = self
            .lock_queues()
            .get_mut(queue)
            .and_then(|messages| messages.pop_front())?;

        let acker = MemoryAcker {
            inner: self.inner.clone(),
            queue: queue.to_string(),
            payload: message.payload.clone(),
        };
        let delivery = Delivery::new(
            queue.to_string(),
            message.payload,
            message.redelivered,
            Box::new(acker),
        );

        dispatch(handler, delivery).await.ok()
    }

    /// Deliver messages until `queue` is empty or `max` deliveries happened
    pub async fn drain(&self, queue: &str, handler: &dyn MessageHandler, max: usize) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while outcomes.len() < max {
            match self.deliver_next(queue, handler).await {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        outcomes
    }

    /// Payloads published to `queue`, in publish order
    pub fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock_published()
            .iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Published payloads decoded as JSON; undecodable payloads are skipped
    pub fn published_json<T: DeserializeOwned>(&self, queue: &str) -> Vec<T> {
        self.published(queue)
            .iter()
            .filter_map(|payload| serde_json::from_slice(payload).ok())
            .collect()
    }

    /// Messages waiting on `queue`, including requeued ones
    pub fn pending(&self, queue: &str) -> usize {
        self.lock_queues().get(queue).map_or(0, VecDeque::len)
    }

    pub fn is_durable(&self, queue: &str) -> bool {
        self.lock_durable().contains(queue)
    }

    pub fn ack_count(&self) -> usize {
        self.inner.acks.load(Ordering::SeqCst)
    }

    pub fn nack_count(&self) -> usize {
        self.inner.nacks.load(Ordering::SeqCst)
    }

    /// Make every subsequent publish fail (or succeed again)
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Simulate a lost connection: consume loops stop and `closed` resolves
    pub fn sever(&self, reason: &str) {
        self.closed.send_replace(Some(reason.to_string()));
        self.inner.arrivals.notify_waiters();
    }

    pub fn is_severed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    /// Simulate the broker cancelling the consumer of `queue` while the
    /// connection stays open
    pub fn cancel_consumer(&self, queue: &str) {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(queue.to_string());
        self.inner.arrivals.notify_waiters();
    }

    fn is_cancelled(&self, queue: &str) -> bool {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(queue)
    }

    fn enqueue(&self, queue: &str, message: StoredMessage, front: bool) {
        {
            let mut queues = self.lock_queues();
            let messages = queues.entry(queue.to_string()).or_default();
            if front {
                messages.push_front(message);
            } else {
                messages.push_back(message);
            }
        }
        self.inner.arrivals.notify_waiters();
    }

    fn lock_queues(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<StoredMessage>>> {
        self.inner.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_durable(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.inner.durable.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_published(&self) -> std::sync::MutexGuard<'_, Vec<(String, Vec<u8>)>> {
        self.inner.published.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn declare_durable_queue(&self, queue: &str) -> Result<(), BrokerError> {
        if self.is_severed() {
            return Err(BrokerError::NotConnected);
        }
        self.lock_durable().insert(queue.to_string());
        self.lock_queues().entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if self.is_severed() {
            return Err(BrokerError::NotConnected);
        }
        if self.inner.fail_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish {
                queue: queue.to_string(),
                reason: "publish failure injected".to_string(),
            });
        }

        self.lock_published()
            .push((queue.to_string(), payload.to_vec()));
        self.enqueue(
            queue,
            StoredMessage {
                payload: payload.to_vec(),
                redelivered: false,
            },
            false,
        );
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<ConsumerHandle, BrokerError> {
        if self.is_severed() {
            return Err(BrokerError::NotConnected);
        }

        let broker = self.clone();
        let queue_name = queue.to_string();
        let mut closed = self.closed.subscribe();

        let task = tokio::spawn(async move {
            loop {
                let arrival = broker.inner.arrivals.notified();
                tokio::pin!(arrival);
                arrival.as_mut().enable();

                if broker.is_severed() || broker.is_cancelled(&queue_name) {
                    break;
                }
                if broker.deliver_next(&queue_name, handler.as_ref()).await.is_some() {
                    continue;
                }

                tokio::select! {
                    _ = &mut arrival => {}
                    _ = closed.changed() => {}
                }
            }
            debug!(queue = %queue_name, "In-memory consumer stopped");
        });

        Ok(ConsumerHandle::new(queue.to_string(), task))
    }
}

#[async_trait]
impl BrokerConnection for InMemoryBroker {
    async fn closed(&self) -> BrokerError {
        let mut rx = self.closed.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(reason) = current {
                return BrokerError::Closed(reason);
            }
            if rx.changed().await.is_err() {
                return BrokerError::Closed("connection dropped".to_string());
            }
        }
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.sever("closed by client");
        Ok(())
    }
}

struct MemoryAcker {
    inner: Arc<Inner>,
    queue: String,
    payload: Vec<u8>,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.inner.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack_requeue(&self) -> Result<(), BrokerError> {
        self.inner.nacks.fetch_add(1, Ordering::SeqCst);
        {
            let mut queues = self.inner.queues.lock().unwrap_or_else(|e| e.into_inner());
            queues
                .entry(self.queue.clone())
                .or_default()
                .push_front(StoredMessage {
                    payload: self.payload.clone(),
                    redelivered: true,
                });
        }
        self.inner.arrivals.notify_waiters();
        Ok(())
    }
}

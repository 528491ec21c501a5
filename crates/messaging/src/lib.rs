//! Message-broker client for the order service.
//!
//! [`MessageBroker`] is the contract every component talks to: durable queue
//! declaration, fire-and-forget publish and a consume loop that acks a
//! delivery when its handler succeeds and nacks it (with requeue) when the
//! handler fails. [`RabbitMqBroker`] speaks AMQP, [`InMemoryBroker`] is the
//! fake used by tests and [`SupervisedBroker`] keeps a connection alive
//! across broker restarts.

pub mod broker;
pub mod consumer;
pub mod memory;
pub mod producer;
pub mod rabbitmq;
pub mod supervisor;

pub use broker::{Acknowledger, BrokerConnection, BrokerError, Delivery, MessageBroker};
pub use consumer::{dispatch, ConsumerHandle, HandlerError, MessageHandler, Outcome};
pub use memory::InMemoryBroker;
pub use producer::{EventPublisher, PublisherError};
pub use rabbitmq::RabbitMqBroker;
pub use supervisor::{BrokerHealth, SupervisedBroker, SupervisorConfig};

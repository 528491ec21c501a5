use anyhow::{anyhow, Result};
use common::config::AppConfig;
use common::shutdown::Shutdown;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use domain::events::queues;
use lifecycle::OrderLifecycleService;
use messaging::{
    BrokerError, ConsumerHandle, EventPublisher, MessageBroker, MessageHandler, RabbitMqBroker,
    SupervisedBroker, SupervisorConfig,
};
use order_store::PostgresOrderRepository;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};

mod error;
mod lgpd_execution;
mod payment_webhook;

use lgpd_execution::LgpdDeletionConsumer;
use payment_webhook::PaymentWebhookConsumer;

/// Declare every queue and attach the consumers. Runs again after each
/// reconnect; the supervisor reconnects as soon as a returned consumer stops.
async fn setup(
    broker: Arc<dyn MessageBroker>,
    payment: Arc<dyn MessageHandler>,
    lgpd: Arc<dyn MessageHandler>,
) -> Result<Vec<ConsumerHandle>, BrokerError> {
    for queue in queues::ALL {
        broker.declare_durable_queue(queue).await?;
    }

    let payment_handle = broker.consume(queues::PAYMENT_UPDATE, payment).await?;
    let lgpd_handle = broker.consume(queues::LGPD_EXECUTION, lgpd).await?;
    info!(
        queues = ?[payment_handle.queue(), lgpd_handle.queue()],
        "Consumers registered"
    );
    Ok(vec![payment_handle, lgpd_handle])
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    init_telemetry(TelemetryConfig::for_service("order-consumers", &config))
        .map_err(|e| anyhow!("failed to initialize telemetry: {}", e))?;

    info!("Starting order consumers");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    let repository = PostgresOrderRepository::new(pool.clone());
    repository.migrate().await?;
    info!("Database connected");

    let shutdown = Shutdown::listen()?;

    let supervisor = SupervisedBroker::<RabbitMqBroker>::new(SupervisorConfig {
        initial_backoff: config.reconnect.initial_backoff(),
        max_backoff: config.reconnect.max_backoff(),
        max_attempts: None,
    });

    // Replies go through the supervisor so they follow reconnects
    let publisher = EventPublisher::new(supervisor.clone() as Arc<dyn MessageBroker>);
    let lifecycle = OrderLifecycleService::new(Arc::new(repository), publisher.clone());

    let payment: Arc<dyn MessageHandler> = Arc::new(PaymentWebhookConsumer::new(lifecycle.clone()));
    let lgpd: Arc<dyn MessageHandler> = Arc::new(LgpdDeletionConsumer::new(lifecycle, publisher));

    let uri = config.amqp.uri();
    let result = supervisor
        .run(
            move || {
                let uri = uri.clone();
                async move { RabbitMqBroker::connect(&uri).await }
            },
            move |broker| setup(broker, payment.clone(), lgpd.clone()),
            shutdown.subscribe(),
        )
        .await;

    if let Err(e) = &result {
        error!(error = %e, "Broker supervisor gave up");
    }

    shutdown.close();
    pool.close().await;
    shutdown_telemetry();
    info!("Order consumers stopped");

    result.map_err(Into::into)
}

use anyhow::{anyhow, Result};
use common::config::AppConfig;
use common::shutdown::Shutdown;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use domain::events::queues;
use lifecycle::{HttpPaymentGateway, OrderLifecycleService};
use messaging::{
    BrokerError, EventPublisher, MessageBroker, RabbitMqBroker, SupervisedBroker, SupervisorConfig,
};
use order_store::PostgresOrderRepository;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

mod error;
mod handlers;
mod routes;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    let gateway_config = config.payment_gateway()?;

    init_telemetry(TelemetryConfig::for_service("order-service", &config))
        .map_err(|e| anyhow!("failed to initialize telemetry: {}", e))?;

    info!("Starting order service");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    let repository = PostgresOrderRepository::new(pool.clone());
    repository.migrate().await?;
    info!("Database connected");

    let shutdown = Arc::new(Shutdown::listen()?);

    let supervisor = SupervisedBroker::<RabbitMqBroker>::new(SupervisorConfig {
        initial_backoff: config.reconnect.initial_backoff(),
        max_backoff: config.reconnect.max_backoff(),
        max_attempts: None,
    });

    let broker_task = {
        let supervisor = supervisor.clone();
        let uri = config.amqp.uri();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            supervisor
                .run(
                    move || {
                        let uri = uri.clone();
                        async move { RabbitMqBroker::connect(&uri).await }
                    },
                    |broker| async move {
                        broker.declare_durable_queue(queues::NEW_ORDER).await?;
                        Ok::<_, BrokerError>(Vec::new())
                    },
                    shutdown_rx,
                )
                .await
        })
    };

    let publisher = EventPublisher::new(supervisor.clone() as Arc<dyn MessageBroker>);
    let gateway = HttpPaymentGateway::new(&gateway_config)?;
    let lifecycle = OrderLifecycleService::new(Arc::new(repository), publisher)
        .with_gateway(Arc::new(gateway));

    let state = state::AppState::new(lifecycle, supervisor.health());
    let app = routes::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Order service listening");

    let served = {
        let shutdown = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
    };

    if let Err(e) = &served {
        error!(error = %e, "Server error");
    }

    // The server can stop without a signal; the broker must follow it
    shutdown.trigger();
    shutdown.close();
    match broker_task.await {
        Ok(Err(e)) => error!(error = %e, "Broker supervisor stopped with error"),
        Err(e) => error!(error = %e, "Broker supervisor task failed"),
        Ok(Ok(())) => {}
    }

    pool.close().await;
    shutdown_telemetry();
    info!("Order service stopped");

    served.map_err(Into::into)
}

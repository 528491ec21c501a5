use opentelemetry::global;
use opentelemetry::trace::TraceError;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;

const DEFAULT_AGENT_ENDPOINT: &str = "localhost:6831";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Jaeger exporter could not be installed: {0}")]
    Exporter(#[from] TraceError),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Where logs go and whether spans are exported to a Jaeger agent
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub jaeger_endpoint: Option<String>,
    pub enable_jaeger: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "order-service".to_string(),
            log_level: "info".to_string(),
            jaeger_endpoint: None,
            enable_jaeger: false,
        }
    }
}

impl TelemetryConfig {
    pub fn for_service(service_name: &str, app: &AppConfig) -> Self {
        Self {
            service_name: service_name.to_string(),
            log_level: app.log_level.clone(),
            jaeger_endpoint: app.jaeger_endpoint.clone(),
            enable_jaeger: app.enable_jaeger,
        }
    }

    pub fn agent_endpoint(&self) -> &str {
        self.jaeger_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_AGENT_ENDPOINT)
    }
}

/// Install the global subscriber: `RUST_LOG` (or the configured level) as the
/// filter, JSON lines on stdout carrying the current span, and span export to
/// Jaeger when `enable_jaeger` is set.
///
/// Fails with [`TelemetryError::AlreadyInstalled`] when called twice.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let json_logs = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_thread_ids(true);

    let jaeger = if config.enable_jaeger {
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(&config.service_name)
            .with_endpoint(config.agent_endpoint())
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };
    let exporting = jaeger.is_some();

    tracing_subscriber::registry()
        .with(filter)
        .with(json_logs)
        .with(jaeger)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        jaeger = exporting,
        "Telemetry initialized"
    );
    Ok(())
}

/// Flush spans still buffered for export
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}

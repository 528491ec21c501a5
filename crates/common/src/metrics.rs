use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge_vec, CounterVec,
    Encoder, HistogramVec, IntGaugeVec, TextEncoder,
};

lazy_static! {
    // Broker metrics
    pub static ref BROKER_MESSAGES: CounterVec = register_counter_vec!(
        "orders_broker_messages_total",
        "Total number of consumed messages by settlement outcome",
        &["queue", "outcome"]
    )
    .expect("metric cannot be created");

    pub static ref BROKER_HANDLER_DURATION: HistogramVec = register_histogram_vec!(
        "orders_broker_handler_duration_seconds",
        "Message handler duration in seconds",
        &["queue"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric cannot be created");

    pub static ref BROKER_PUBLISHED: CounterVec = register_counter_vec!(
        "orders_broker_published_total",
        "Total number of publish attempts",
        &["queue", "status"]
    )
    .expect("metric cannot be created");

    // Order lifecycle metrics
    pub static ref LIFECYCLE_OPERATIONS: CounterVec = register_counter_vec!(
        "orders_lifecycle_operations_total",
        "Total number of order lifecycle operations",
        &["operation", "status"]
    )
    .expect("metric cannot be created");

    pub static ref LIFECYCLE_DURATION: HistogramVec = register_histogram_vec!(
        "orders_lifecycle_duration_seconds",
        "Order lifecycle operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric cannot be created");

    pub static ref PAYMENT_LINK_REQUESTS: CounterVec = register_counter_vec!(
        "orders_payment_link_requests_total",
        "Total number of payment link requests to the gateway",
        &["status"]
    )
    .expect("metric cannot be created");

    // Circuit breaker metrics
    pub static ref CIRCUIT_BREAKER_STATE: IntGaugeVec = register_int_gauge_vec!(
        "orders_circuit_breaker_state",
        "Circuit breaker state (0=closed, 1=open, 2=half-open)",
        &["service"]
    )
    .expect("metric cannot be created");

    pub static ref CIRCUIT_BREAKER_COUNTER: CounterVec = register_counter_vec!(
        "orders_circuit_breaker_total",
        "Total number of circuit breaker state changes",
        &["service", "from_state", "to_state"]
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a consumed message and how long its handler ran
pub fn record_message(queue: &str, outcome: &str, duration_secs: f64) {
    BROKER_MESSAGES.with_label_values(&[queue, outcome]).inc();
    BROKER_HANDLER_DURATION
        .with_label_values(&[queue])
        .observe(duration_secs);
}

pub fn record_publish(queue: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    BROKER_PUBLISHED.with_label_values(&[queue, status]).inc();
}

/// Record an order lifecycle operation
pub fn record_lifecycle(operation: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    LIFECYCLE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
    LIFECYCLE_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

pub fn record_payment_link(success: bool) {
    let status = if success { "success" } else { "error" };
    PAYMENT_LINK_REQUESTS.with_label_values(&[status]).inc();
}

pub fn record_circuit_breaker_state(service: &str, state: CircuitBreakerState) {
    let state_value = match state {
        CircuitBreakerState::Closed => 0,
        CircuitBreakerState::Open => 1,
        CircuitBreakerState::HalfOpen => 2,
    };
    CIRCUIT_BREAKER_STATE
        .with_label_values(&[service])
        .set(state_value);
}

pub fn record_circuit_breaker_transition(service: &str, from: CircuitBreakerState, to: CircuitBreakerState) {
    CIRCUIT_BREAKER_COUNTER
        .with_label_values(&[service, &format!("{:?}", from), &format!("{:?}", to)])
        .inc();
}

#[derive(Debug, Clone, Copy)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

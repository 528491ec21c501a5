pub mod circuit_breaker;
pub mod config;
pub mod metrics;
pub mod shutdown;
pub mod telemetry;

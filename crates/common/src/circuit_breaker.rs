use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::metrics::{
    record_circuit_breaker_state, record_circuit_breaker_transition,
    CircuitBreakerState as MetricsState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl From<CircuitBreakerState> for MetricsState {
    fn from(state: CircuitBreakerState) -> Self {
        match state {
            CircuitBreakerState::Closed => MetricsState::Closed,
            CircuitBreakerState::Open => MetricsState::Open,
            CircuitBreakerState::HalfOpen => MetricsState::HalfOpen,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Successful trial calls needed to close it again
    pub success_threshold: u32,
    /// Per-call timeout
    pub timeout: Duration,
    /// How long the circuit stays open before a trial call is let through
    pub half_open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(10),
            half_open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open")]
    Open,

    #[error("Call timed out")]
    Timeout,

    #[error("Call failed: {0}")]
    CallFailed(E),
}

#[derive(Debug)]
struct Inner {
    state: CircuitBreakerState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

/// Guards calls to an external service.
///
/// Failures (errors or timeouts) are counted while closed; reaching the
/// threshold opens the circuit and calls fail fast with
/// [`CircuitBreakerError::Open`]. After `half_open_timeout` trial calls are let
/// through, and any failure among them reopens the circuit.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        record_circuit_breaker_state(&name, MetricsState::Closed);

        Self {
            name,
            config,
            inner: Mutex::new(Inner {
                state: CircuitBreakerState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Run `f` under the breaker with the configured timeout
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.permit().await {
            tracing::debug!(service = %self.name, "Circuit open, call rejected");
            return Err(CircuitBreakerError::Open);
        }

        let started = Instant::now();
        match tokio::time::timeout(self.config.timeout, f).await {
            Ok(Ok(value)) => {
                self.on_success().await;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.on_failure().await;
                tracing::warn!(
                    service = %self.name,
                    duration_ms = %started.elapsed().as_millis(),
                    "Guarded call failed"
                );
                Err(CircuitBreakerError::CallFailed(err))
            }
            Err(_) => {
                self.on_failure().await;
                tracing::error!(
                    service = %self.name,
                    timeout_ms = %self.config.timeout.as_millis(),
                    "Guarded call timed out"
                );
                Err(CircuitBreakerError::Timeout)
            }
        }
    }

    pub async fn state(&self) -> CircuitBreakerState {
        self.inner.lock().await.state
    }

    async fn permit(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.half_open_timeout)
                    .unwrap_or(true);
                if cooled_down {
                    inner.successes = 0;
                    self.transition(&mut inner, CircuitBreakerState::HalfOpen);
                }
                cooled_down
            }
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitBreakerState::Closed => inner.failures = 0,
            CircuitBreakerState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.opened_at = None;
                    self.transition(&mut inner, CircuitBreakerState::Closed);
                }
            }
            CircuitBreakerState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failures += 1;

        let should_open = match inner.state {
            CircuitBreakerState::Closed => inner.failures >= self.config.failure_threshold,
            CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => false,
        };

        if should_open {
            inner.opened_at = Some(Instant::now());
            tracing::warn!(service = %self.name, failures = inner.failures, "Circuit breaker opened");
            self.transition(&mut inner, CircuitBreakerState::Open);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitBreakerState) {
        let from = inner.state;
        inner.state = to;
        record_circuit_breaker_transition(&self.name, from.into(), to.into());
        record_circuit_breaker_state(&self.name, to.into());
        tracing::info!(service = %self.name, from = ?from, to = ?to, "Circuit breaker state changed");
    }
}

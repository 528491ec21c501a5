use async_trait::async_trait;
use common::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use common::config::PaymentGatewayConfig;
use domain::Order;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway unreachable: {0}")]
    Transport(String),

    #[error("Gateway answered with status {0}")]
    Status(u16),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),

    #[error("Gateway circuit is open")]
    CircuitOpen,

    #[error("Gateway call timed out")]
    Timeout,

    #[error("No payment gateway configured")]
    NotConfigured,
}

/// Turns an order into a payment URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, order: &Order) -> Result<String, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct PaymentLinkResponse {
    payment_url: String,
}

/// HTTP client for the payment service, guarded by a circuit breaker
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    endpoint: String,
    breaker: CircuitBreaker,
}

impl HttpPaymentGateway {
    pub fn new(config: &PaymentGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let breaker = CircuitBreaker::new(
            "payment-gateway",
            CircuitBreakerConfig {
                timeout: config.timeout(),
                ..Default::default()
            },
        );

        Ok(Self {
            client,
            endpoint: format!("{}/api/payment", config.base_url.trim_end_matches('/')),
            breaker,
        })
    }

    async fn request_link(&self, order: &Order) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(order)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body: PaymentLinkResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(body.payment_url)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment(&self, order: &Order) -> Result<String, GatewayError> {
        debug!(order_id = %order.id, endpoint = %self.endpoint, "Requesting payment link");

        let result = self.breaker.call(self.request_link(order)).await;
        common::metrics::record_payment_link(result.is_ok());

        result.map_err(|e| {
            let err = match e {
                CircuitBreakerError::Open => GatewayError::CircuitOpen,
                CircuitBreakerError::Timeout => GatewayError::Timeout,
                CircuitBreakerError::CallFailed(inner) => inner,
            };
            warn!(order_id = %order.id, error = %err, "Payment link request failed");
            err
        })
    }
}

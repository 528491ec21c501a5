pub mod errors;
pub mod gateway;
pub mod service;

pub use errors::{LifecycleError, Result};
pub use gateway::{GatewayError, HttpPaymentGateway, PaymentGateway};
pub use service::{CreatedOrder, OrderLifecycleService};

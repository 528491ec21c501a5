pub mod aggregates;
pub mod commands;
pub mod errors;
pub mod events;

pub use aggregates::order::{Category, ClientId, Order, OrderError, OrderId, OrderStatus, Product, StatusChange};
pub use commands::order_commands::CreateOrderCommand;
pub use errors::DomainError;

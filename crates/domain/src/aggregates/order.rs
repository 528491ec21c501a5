use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub type OrderId = String;
pub type ClientId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "AGUARDANDO_PAGAMENTO")]
    AwaitingPayment,
    #[serde(rename = "RECEBIDO")]
    Received,
    #[serde(rename = "EM_PREPARACAO")]
    InPreparation,
    #[serde(rename = "PRONTO")]
    Ready,
    #[serde(rename = "FINALIZADO")]
    Finished,
    #[serde(rename = "CANCELADO")]
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::AwaitingPayment,
        OrderStatus::Received,
        OrderStatus::InPreparation,
        OrderStatus::Ready,
        OrderStatus::Finished,
        OrderStatus::Cancelled,
    ];

    /// Statuses shown on the kitchen queue, most urgent first
    pub const QUEUE: [OrderStatus; 3] = [
        OrderStatus::Ready,
        OrderStatus::InPreparation,
        OrderStatus::Received,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPayment => "AGUARDANDO_PAGAMENTO",
            OrderStatus::Received => "RECEBIDO",
            OrderStatus::InPreparation => "EM_PREPARACAO",
            OrderStatus::Ready => "PRONTO",
            OrderStatus::Finished => "FINALIZADO",
            OrderStatus::Cancelled => "CANCELADO",
        }
    }

    /// Position on the kitchen queue, `None` for orders that are not on it
    pub fn queue_rank(&self) -> Option<usize> {
        Self::QUEUE.iter().position(|s| s == self)
    }

    /// Resolve a requested transition. Manual transitions may set any value,
    /// so the result only depends on the requested status.
    pub fn transition(self, requested: OrderStatus) -> StatusChange {
        StatusChange {
            from: self,
            to: requested,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl StatusChange {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub client_id: ClientId,
    pub status: OrderStatus,
    pub products: Vec<Product>,
    pub price: f64,
}

impl Order {
    /// Place a new order awaiting payment. `product_ids` is the requested
    /// list, `catalog` the products that were resolved for it.
    pub fn place(
        client_id: ClientId,
        product_ids: &[String],
        catalog: &[Product],
    ) -> Result<Self, OrderError> {
        if product_ids.is_empty() {
            return Err(OrderError::NoProducts);
        }

        let mut products = Vec::with_capacity(product_ids.len());
        for product_id in product_ids {
            let product = catalog
                .iter()
                .find(|p| &p.id == product_id)
                .ok_or_else(|| OrderError::UnknownProduct(product_id.clone()))?;
            products.push(product.clone());
        }

        let price = total_price(&products);

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            client_id,
            status: OrderStatus::AwaitingPayment,
            products,
            price,
        })
    }

    pub fn apply_status(&mut self, requested: OrderStatus) -> StatusChange {
        let change = self.status.transition(requested);
        self.status = change.to;
        change
    }
}

pub fn total_price(products: &[Product]) -> f64 {
    products.iter().map(|p| p.price).sum()
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order must have at least one product")]
    NoProducts,

    #[error("Product not found: {0}")]
    UnknownProduct(String),

    #[error("Invalid order status '{0}'")]
    UnknownStatus(String),
}

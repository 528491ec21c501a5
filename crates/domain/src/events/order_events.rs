use super::{queues, QueueMessage};
use crate::aggregates::order::Order;
use serde::{Deserialize, Serialize};

/// Snapshot of an order at creation time, published on `new_order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewOrderEvent(pub Order);

impl From<Order> for NewOrderEvent {
    fn from(order: Order) -> Self {
        Self(order)
    }
}

impl QueueMessage for NewOrderEvent {
    fn queue() -> &'static str {
        queues::NEW_ORDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::order::OrderStatus;

    #[test]
    fn test_new_order_event_is_the_bare_order() {
        let order = Order {
            id: "o1".to_string(),
            client_id: "c1".to_string(),
            status: OrderStatus::AwaitingPayment,
            products: vec![],
            price: 0.0,
        };

        let payload = serde_json::to_vec(&NewOrderEvent::from(order.clone())).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(json["id"], "o1");
        assert_eq!(json["clientId"], "c1");
        assert_eq!(NewOrderEvent::from_payload(&payload).unwrap().0, order);
    }
}

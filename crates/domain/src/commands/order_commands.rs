use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::aggregates::order::ClientId;

/// Command to place a new order
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderCommand {
    #[validate(length(min = 1, message = "Client id cannot be empty"))]
    pub client_id: ClientId,

    #[validate(length(min = 1, message = "Order must have at least one product"))]
    pub product_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_command_validation() {
        let cmd = CreateOrderCommand {
            client_id: "c1".to_string(),
            product_ids: vec!["p1".to_string(), "p2".to_string()],
        };

        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_create_order_without_products_fails_validation() {
        let cmd = CreateOrderCommand {
            client_id: "c1".to_string(),
            product_ids: vec![],
        };

        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_create_order_without_client_fails_validation() {
        let cmd = CreateOrderCommand {
            client_id: String::new(),
            product_ids: vec!["p1".to_string()],
        };

        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_create_order_body_is_camel_case() {
        let cmd: CreateOrderCommand =
            serde_json::from_str(r#"{"clientId":"c1","productIds":["p1","p2"]}"#).unwrap();

        assert_eq!(cmd.client_id, "c1");
        assert_eq!(cmd.product_ids, vec!["p1", "p2"]);
    }
}

// Order domain types
//
// Everything here crosses the activity boundary as JSON, so field names are
// camelCase to match what clients post.

use serde::{Deserialize, Serialize};

/// What a customer asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub name: String,
    pub quantity: u32,
}

impl OrderPayload {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// Stock level of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub name: String,
    pub quantity: u32,
}

/// Input of the reserve and update inventory activities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRequest {
    /// Order id the request belongs to
    pub request_id: String,
    pub item_name: String,
    pub quantity: u32,
}

/// Outcome of an inventory check or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResult {
    pub success: bool,

    /// Item snapshot; absent when the item is unknown or short
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<InventoryItem>,
}

impl InventoryResult {
    pub fn available(item: InventoryItem) -> Self {
        Self {
            success: true,
            item: Some(item),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            success: false,
            item: None,
        }
    }
}

/// Input of the payment activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub request_id: String,
    pub item_name: String,
    pub quantity: u32,
}

/// Final result of an order workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub processed: bool,
    pub message: String,
}

impl OrderResult {
    pub fn processed(message: impl Into<String>) -> Self {
        Self {
            processed: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            processed: false,
            message: message.into(),
        }
    }
}

/// Message for the notify activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub message: String,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requests_use_camel_case() {
        let request = InventoryRequest {
            request_id: "order-1".into(),
            item_name: "Car".into(),
            quantity: 2,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"requestId": "order-1", "itemName": "Car", "quantity": 2})
        );
    }

    #[test]
    fn test_unavailable_result_omits_item() {
        let value = serde_json::to_value(InventoryResult::unavailable()).unwrap();
        assert_eq!(value, json!({"success": false}));

        let parsed: InventoryResult = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, InventoryResult::unavailable());
    }

    #[test]
    fn test_order_payload_from_client_json() {
        let payload: OrderPayload =
            serde_json::from_value(json!({"name": "Car", "quantity": 10})).unwrap();
        assert_eq!(payload, OrderPayload::new("Car", 10));
    }
}

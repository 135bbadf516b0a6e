// Order activities
//
// The four units of work the order workflow schedules:
// - NotifyActivity: tells the customer what happened
// - ReserveInventoryActivity: checks stock without taking it
// - ProcessPaymentActivity: charges through a PaymentProcessor
// - UpdateInventoryActivity: takes the stock
//
// Business refusals (short stock, declined payment) are successful outputs.
// Only failures to run at all are returned as ActivityError.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orderflow_durable::activity::{Activity, ActivityContext, ActivityError};
use parking_lot::Mutex;
use tracing::info;

use crate::inventory::InventoryService;
use crate::models::{InventoryRequest, InventoryResult, Notification, PaymentRequest};
use crate::payment::PaymentProcessor;

// ============================================================================
// Notifications
// ============================================================================

/// Messages sent by [`NotifyActivity`], oldest first
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: impl Into<String>) {
        self.messages.lock().push(message.into());
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

/// Logs a customer notification
pub struct NotifyActivity {
    log: NotificationLog,
}

impl NotifyActivity {
    pub fn new(log: NotificationLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Activity for NotifyActivity {
    const TYPE: &'static str = "NotifyActivity";
    type Input = Notification;
    type Output = ();

    async fn execute(&self, ctx: &ActivityContext, input: Notification) -> Result<(), ActivityError> {
        info!(instance_id = %ctx.instance_id, "{}", input.message);
        self.log.push(input.message);
        Ok(())
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Reports whether the requested quantity is in stock
pub struct ReserveInventoryActivity {
    inventory: InventoryService,
}

impl ReserveInventoryActivity {
    pub fn new(inventory: InventoryService) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl Activity for ReserveInventoryActivity {
    const TYPE: &'static str = "ReserveInventoryActivity";
    type Input = InventoryRequest;
    type Output = InventoryResult;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        req: InventoryRequest,
    ) -> Result<InventoryResult, ActivityError> {
        info!(
            request_id = %req.request_id,
            quantity = req.quantity,
            item = %req.item_name,
            "reserving inventory"
        );

        match self.inventory.check_available(&req.item_name, req.quantity) {
            Some(item) => {
                info!(available = item.quantity, item = %item.name, "inventory check successful");
                Ok(InventoryResult::available(item))
            }
            None => {
                info!(quantity = req.quantity, item = %req.item_name, "inventory check failed");
                Ok(InventoryResult::unavailable())
            }
        }
    }
}

/// Takes the ordered quantity out of stock
pub struct UpdateInventoryActivity {
    inventory: InventoryService,
    delay: Duration,
}

impl UpdateInventoryActivity {
    pub fn new(inventory: InventoryService, delay: Duration) -> Self {
        Self { inventory, delay }
    }
}

#[async_trait]
impl Activity for UpdateInventoryActivity {
    const TYPE: &'static str = "UpdateInventoryActivity";
    type Input = InventoryRequest;
    type Output = InventoryResult;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        req: InventoryRequest,
    ) -> Result<InventoryResult, ActivityError> {
        info!(
            request_id = %req.request_id,
            quantity = req.quantity,
            item = %req.item_name,
            "updating inventory"
        );

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = ctx.cancelled() => {
                    return Err(ActivityError::non_retryable("inventory update cancelled"));
                }
            }
        }

        match self.inventory.try_decrement(&req.item_name, req.quantity) {
            Some(item) => {
                info!(remaining = item.quantity, item = %item.name, "inventory updated");
                Ok(InventoryResult::available(item))
            }
            None => {
                info!(request_id = %req.request_id, "insufficient inventory at update");
                Ok(InventoryResult::unavailable())
            }
        }
    }
}

// ============================================================================
// Payment
// ============================================================================

/// Charges the order through the configured processor
pub struct ProcessPaymentActivity {
    processor: Arc<dyn PaymentProcessor>,
}

impl ProcessPaymentActivity {
    pub fn new(processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl Activity for ProcessPaymentActivity {
    const TYPE: &'static str = "ProcessPaymentActivity";
    type Input = PaymentRequest;
    type Output = bool;

    async fn execute(&self, ctx: &ActivityContext, req: PaymentRequest) -> Result<bool, ActivityError> {
        info!(
            request_id = %req.request_id,
            quantity = req.quantity,
            item = %req.item_name,
            "processing payment"
        );

        tokio::select! {
            result = self.processor.process(&req) => Ok(result?),
            _ = ctx.cancelled() => Err(ActivityError::non_retryable("payment cancelled")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::SimulatedPaymentProcessor;
    use orderflow_durable::persistence::InstanceId;

    fn ctx(activity_type: &str) -> ActivityContext {
        ActivityContext::new(InstanceId::from("order-1"), "step", activity_type)
    }

    fn request(quantity: u32) -> InventoryRequest {
        InventoryRequest {
            request_id: "order-1".into(),
            item_name: "Car".into(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_notify_appends_to_log() {
        let log = NotificationLog::new();
        let activity = NotifyActivity::new(log.clone());

        activity
            .execute(&ctx(NotifyActivity::TYPE), Notification::new("hello"))
            .await
            .unwrap();

        assert_eq!(log.messages(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_reserve_does_not_take_stock() {
        let inventory = InventoryService::new().with_item("Car", 5);
        let activity = ReserveInventoryActivity::new(inventory.clone());

        let ok = activity.execute(&ctx("reserve"), request(5)).await.unwrap();
        assert!(ok.success);
        assert_eq!(ok.item.map(|i| i.quantity), Some(5));

        let short = activity.execute(&ctx("reserve"), request(6)).await.unwrap();
        assert_eq!(short, InventoryResult::unavailable());

        assert_eq!(inventory.get_item("Car").map(|i| i.quantity), Some(5));
    }

    #[tokio::test]
    async fn test_update_takes_stock() {
        let inventory = InventoryService::new().with_item("Car", 5);
        let activity = UpdateInventoryActivity::new(inventory.clone(), Duration::ZERO);

        let result = activity.execute(&ctx("update"), request(3)).await.unwrap();
        assert_eq!(result.item.map(|i| i.quantity), Some(2));

        let short = activity.execute(&ctx("update"), request(3)).await.unwrap();
        assert!(!short.success);
        assert_eq!(inventory.get_item("Car").map(|i| i.quantity), Some(2));
    }

    #[tokio::test]
    async fn test_payment_uses_processor() {
        let declined = ProcessPaymentActivity::new(Arc::new(SimulatedPaymentProcessor::declining()));
        let req = PaymentRequest {
            request_id: "order-1".into(),
            item_name: "Car".into(),
            quantity: 1,
        };

        assert!(!declined.execute(&ctx("pay"), req.clone()).await.unwrap());

        let approved = ProcessPaymentActivity::new(Arc::new(SimulatedPaymentProcessor::approving()));
        assert!(approved.execute(&ctx("pay"), req).await.unwrap());
    }
}

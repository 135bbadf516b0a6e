// Order Processing Workflow
//
// Stages, one activity each:
// 1. Notify the customer the order was received
// 2. Reserve inventory; short stock ends the order
// 3. Process payment; a declined payment ends the order with a refund notice
// 4. Update inventory; short stock or an error ends the order with a refund notice
// 5. Notify the customer the order completed
//
// Every path ends in exactly one CompleteWorkflow. Refusals complete with
// processed = false. Failures of any step other than the inventory update
// fail the instance.

use orderflow_durable::activity::{Activity, ActivityError};
use orderflow_durable::workflow::{Workflow, WorkflowAction, WorkflowContext, WorkflowError};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::activities::{
    NotifyActivity, ProcessPaymentActivity, ReserveInventoryActivity, UpdateInventoryActivity,
};
use crate::models::{InventoryRequest, InventoryResult, Notification, OrderPayload, OrderResult, PaymentRequest};

pub const ORDER_COMPLETED: &str = "Order has completed!";
pub const INSUFFICIENT_INVENTORY: &str = "Order failed due to insufficient inventory";
pub const PAYMENT_FAILED: &str = "Order failed during payment processing";
pub const INVENTORY_UPDATE_FAILED: &str = "Order failed during inventory update";

/// Error code for an activity output the workflow cannot read
pub const INVALID_OUTPUT_CODE: &str = "INVALID_ACTIVITY_OUTPUT";

/// Error code for a result from a step the workflow is not waiting on
pub const UNEXPECTED_ACTIVITY_CODE: &str = "UNEXPECTED_ACTIVITY";

// ============================================================================
// Activity IDs
// ============================================================================

mod activity_ids {
    pub const NOTIFY_RECEIVED: &str = "notify-received";
    pub const RESERVE_INVENTORY: &str = "reserve-inventory";
    pub const PROCESS_PAYMENT: &str = "process-payment";
    pub const UPDATE_INVENTORY: &str = "update-inventory";
    pub const NOTIFY_OUTCOME: &str = "notify-outcome";
}

// ============================================================================
// Workflow State
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum OrderStage {
    Init,
    NotifyingReceived,
    Reserving,
    ProcessingPayment,
    UpdatingInventory,

    /// Final notification sent; completes with `result` once delivered
    NotifyingOutcome { result: OrderResult },

    Done,
}

/// Order processing state machine
#[derive(Debug)]
pub struct OrderProcessingWorkflow {
    order_id: String,
    order: OrderPayload,
    stage: OrderStage,
    custom_status: Option<String>,
}

impl OrderProcessingWorkflow {
    /// Human-readable note on why the order stopped early, if it did
    pub fn custom_status(&self) -> Option<&str> {
        self.custom_status.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.stage == OrderStage::Done
    }

    fn inventory_request(&self) -> InventoryRequest {
        InventoryRequest {
            request_id: self.order_id.clone(),
            item_name: self.order.name.clone(),
            quantity: self.order.quantity,
        }
    }

    // =========================================================================
    // State Transitions
    // =========================================================================

    fn schedule(&mut self, stage: OrderStage, activity_id: &str, activity_type: &str, input: Value) -> Vec<WorkflowAction> {
        self.stage = stage;
        vec![WorkflowAction::schedule_activity(activity_id, activity_type, input)]
    }

    fn notify_received(&mut self) -> Vec<WorkflowAction> {
        let notification = Notification::new(format!(
            "Received order {} for {} {}",
            self.order_id, self.order.quantity, self.order.name
        ));
        self.schedule(
            OrderStage::NotifyingReceived,
            activity_ids::NOTIFY_RECEIVED,
            NotifyActivity::TYPE,
            json!(notification),
        )
    }

    fn reserve_inventory(&mut self) -> Vec<WorkflowAction> {
        let request = self.inventory_request();
        self.schedule(
            OrderStage::Reserving,
            activity_ids::RESERVE_INVENTORY,
            ReserveInventoryActivity::TYPE,
            json!(request),
        )
    }

    fn process_payment(&mut self) -> Vec<WorkflowAction> {
        let request = PaymentRequest {
            request_id: self.order_id.clone(),
            item_name: self.order.name.clone(),
            quantity: self.order.quantity,
        };
        self.schedule(
            OrderStage::ProcessingPayment,
            activity_ids::PROCESS_PAYMENT,
            ProcessPaymentActivity::TYPE,
            json!(request),
        )
    }

    fn update_inventory(&mut self) -> Vec<WorkflowAction> {
        let request = self.inventory_request();
        self.schedule(
            OrderStage::UpdatingInventory,
            activity_ids::UPDATE_INVENTORY,
            UpdateInventoryActivity::TYPE,
            json!(request),
        )
    }

    fn notify_outcome(&mut self, message: String, result: OrderResult) -> Vec<WorkflowAction> {
        self.schedule(
            OrderStage::NotifyingOutcome { result },
            activity_ids::NOTIFY_OUTCOME,
            NotifyActivity::TYPE,
            json!(Notification::new(message)),
        )
    }

    fn refund(&mut self, status: &str, message: &str) -> Vec<WorkflowAction> {
        self.custom_status = Some(status.to_string());
        let notice = format!("Order {} Failed! You are now getting a refund", self.order_id);
        self.notify_outcome(notice, OrderResult::rejected(message))
    }

    fn complete(&mut self, result: OrderResult) -> Vec<WorkflowAction> {
        self.stage = OrderStage::Done;
        vec![WorkflowAction::complete(json!(result))]
    }

    fn fail(&mut self, error: WorkflowError) -> Vec<WorkflowAction> {
        self.stage = OrderStage::Done;
        vec![WorkflowAction::fail(error)]
    }

    // =========================================================================
    // Result Handlers
    // =========================================================================

    fn handle_reserved(&mut self, result: InventoryResult) -> Vec<WorkflowAction> {
        if result.success {
            return self.process_payment();
        }

        self.custom_status = Some("Stopped order process due to insufficient inventory".to_string());
        let notice = format!("Insufficient inventory for {}", self.order.name);
        self.notify_outcome(notice, OrderResult::rejected(INSUFFICIENT_INVENTORY))
    }

    fn handle_payment(&mut self, approved: bool) -> Vec<WorkflowAction> {
        if approved {
            self.update_inventory()
        } else {
            self.refund("Stopped order process due to payment failure", PAYMENT_FAILED)
        }
    }

    fn handle_inventory_updated(&mut self, result: InventoryResult) -> Vec<WorkflowAction> {
        if result.success {
            let notice = format!("Order {} has completed!", self.order_id);
            self.notify_outcome(notice, OrderResult::processed(ORDER_COMPLETED))
        } else {
            self.inventory_update_failed()
        }
    }

    fn inventory_update_failed(&mut self) -> Vec<WorkflowAction> {
        self.refund(
            "Stopped order process due to error in inventory update",
            INVENTORY_UPDATE_FAILED,
        )
    }

    fn unexpected(&mut self, stage: &OrderStage, activity_id: &str) -> Vec<WorkflowAction> {
        self.fail(
            WorkflowError::new(format!("unexpected result for {activity_id} while {stage:?}"))
                .with_code(UNEXPECTED_ACTIVITY_CODE),
        )
    }
}

fn decode<T: DeserializeOwned>(activity_id: &str, output: Value) -> Result<T, WorkflowError> {
    serde_json::from_value(output).map_err(|e| {
        WorkflowError::new(format!("invalid output from {activity_id}: {e}")).with_code(INVALID_OUTPUT_CODE)
    })
}

impl Workflow for OrderProcessingWorkflow {
    const TYPE: &'static str = "OrderProcessingWorkflow";
    type Input = OrderPayload;
    type Output = OrderResult;

    fn new(ctx: &WorkflowContext, input: Self::Input) -> Self {
        Self {
            order_id: ctx.instance_id.to_string(),
            order: input,
            stage: OrderStage::Init,
            custom_status: None,
        }
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        self.notify_received()
    }

    fn on_activity_completed(&mut self, activity_id: &str, output: Value) -> Vec<WorkflowAction> {
        let stage = std::mem::replace(&mut self.stage, OrderStage::Done);

        let actions = match (&stage, activity_id) {
            (OrderStage::NotifyingReceived, activity_ids::NOTIFY_RECEIVED) => {
                return self.reserve_inventory();
            }
            (OrderStage::Reserving, activity_ids::RESERVE_INVENTORY) => {
                decode(activity_id, output).map(|r| self.handle_reserved(r))
            }
            (OrderStage::ProcessingPayment, activity_ids::PROCESS_PAYMENT) => {
                decode(activity_id, output).map(|ok| self.handle_payment(ok))
            }
            (OrderStage::UpdatingInventory, activity_ids::UPDATE_INVENTORY) => {
                decode(activity_id, output).map(|r| self.handle_inventory_updated(r))
            }
            (OrderStage::NotifyingOutcome { result }, activity_ids::NOTIFY_OUTCOME) => {
                return self.complete(result.clone());
            }
            _ => return self.unexpected(&stage, activity_id),
        };

        actions.unwrap_or_else(|error| self.fail(error))
    }

    fn on_activity_failed(&mut self, activity_id: &str, error: &ActivityError) -> Vec<WorkflowAction> {
        if self.stage == OrderStage::UpdatingInventory && activity_id == activity_ids::UPDATE_INVENTORY {
            tracing::warn!(order_id = %self.order_id, error = %error, "inventory update failed");
            return self.inventory_update_failed();
        }

        self.fail(WorkflowError::from(error))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_durable::persistence::InstanceId;

    fn start(name: &str, quantity: u32) -> (OrderProcessingWorkflow, Vec<WorkflowAction>) {
        let ctx = WorkflowContext::new(InstanceId::from("order-1"));
        let mut workflow = OrderProcessingWorkflow::new(&ctx, OrderPayload::new(name, quantity));
        let actions = workflow.on_start();
        (workflow, actions)
    }

    fn scheduled(actions: &[WorkflowAction]) -> (String, String, Value) {
        match actions {
            [WorkflowAction::ScheduleActivity {
                activity_id,
                activity_type,
                input,
                ..
            }] => (activity_id.clone(), activity_type.clone(), input.clone()),
            other => panic!("expected one scheduled activity, got {other:?}"),
        }
    }

    fn completed(actions: &[WorkflowAction]) -> OrderResult {
        match actions {
            [WorkflowAction::CompleteWorkflow { result }] => serde_json::from_value(result.clone()).unwrap(),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    /// Feed outputs to the workflow until it stops scheduling
    fn drive(workflow: &mut OrderProcessingWorkflow, mut actions: Vec<WorkflowAction>, outputs: &[(&str, Value)]) -> Vec<WorkflowAction> {
        for (expected_type, output) in outputs {
            let (activity_id, activity_type, _) = scheduled(&actions);
            assert_eq!(&activity_type, expected_type);
            actions = workflow.on_activity_completed(&activity_id, output.clone());
        }
        actions
    }

    fn available(quantity: u32) -> Value {
        json!({"success": true, "item": {"name": "Car", "quantity": quantity}})
    }

    #[test]
    fn test_start_notifies_receipt() {
        let (workflow, actions) = start("Car", 10);

        let (id, ty, input) = scheduled(&actions);
        assert_eq!(id, activity_ids::NOTIFY_RECEIVED);
        assert_eq!(ty, NotifyActivity::TYPE);
        assert_eq!(input["message"], "Received order order-1 for 10 Car");
        assert!(!workflow.is_finished());
    }

    #[test]
    fn test_happy_path() {
        let (mut workflow, actions) = start("Car", 10);

        let actions = drive(
            &mut workflow,
            actions,
            &[
                (NotifyActivity::TYPE, Value::Null),
                (ReserveInventoryActivity::TYPE, available(50)),
                (ProcessPaymentActivity::TYPE, json!(true)),
                (UpdateInventoryActivity::TYPE, available(40)),
            ],
        );
        let (_, _, input) = scheduled(&actions);
        assert_eq!(input["message"], "Order order-1 has completed!");

        let actions = drive(&mut workflow, actions, &[(NotifyActivity::TYPE, Value::Null)]);
        assert_eq!(completed(&actions), OrderResult::processed(ORDER_COMPLETED));
        assert!(workflow.is_finished());
        assert_eq!(workflow.custom_status(), None);
    }

    #[test]
    fn test_insufficient_inventory() {
        let (mut workflow, actions) = start("Car", 10);

        let actions = drive(
            &mut workflow,
            actions,
            &[
                (NotifyActivity::TYPE, Value::Null),
                (ReserveInventoryActivity::TYPE, json!({"success": false})),
            ],
        );
        let (_, _, input) = scheduled(&actions);
        assert_eq!(input["message"], "Insufficient inventory for Car");

        let actions = drive(&mut workflow, actions, &[(NotifyActivity::TYPE, Value::Null)]);
        assert_eq!(completed(&actions), OrderResult::rejected(INSUFFICIENT_INVENTORY));
        assert_eq!(
            workflow.custom_status(),
            Some("Stopped order process due to insufficient inventory")
        );
    }

    #[test]
    fn test_declined_payment_skips_inventory_update() {
        let (mut workflow, actions) = start("Car", 1);

        let actions = drive(
            &mut workflow,
            actions,
            &[
                (NotifyActivity::TYPE, Value::Null),
                (ReserveInventoryActivity::TYPE, available(50)),
                (ProcessPaymentActivity::TYPE, json!(false)),
            ],
        );
        let (_, ty, input) = scheduled(&actions);
        assert_eq!(ty, NotifyActivity::TYPE);
        assert_eq!(input["message"], "Order order-1 Failed! You are now getting a refund");

        let actions = drive(&mut workflow, actions, &[(NotifyActivity::TYPE, Value::Null)]);
        assert_eq!(completed(&actions), OrderResult::rejected(PAYMENT_FAILED));
    }

    #[test]
    fn test_inventory_update_error_is_caught() {
        let (mut workflow, actions) = start("Car", 1);

        let actions = drive(
            &mut workflow,
            actions,
            &[
                (NotifyActivity::TYPE, Value::Null),
                (ReserveInventoryActivity::TYPE, available(50)),
                (ProcessPaymentActivity::TYPE, json!(true)),
            ],
        );
        let (id, _, _) = scheduled(&actions);

        let actions = workflow.on_activity_failed(&id, &ActivityError::non_retryable("db down"));
        let actions = drive(&mut workflow, actions, &[(NotifyActivity::TYPE, Value::Null)]);

        assert_eq!(completed(&actions), OrderResult::rejected(INVENTORY_UPDATE_FAILED));
        assert_eq!(
            workflow.custom_status(),
            Some("Stopped order process due to error in inventory update")
        );
    }

    #[test]
    fn test_other_failures_fail_the_workflow() {
        let (mut workflow, actions) = start("Car", 1);
        let actions = drive(&mut workflow, actions, &[(NotifyActivity::TYPE, Value::Null)]);
        let (id, _, _) = scheduled(&actions);

        let actions = workflow.on_activity_failed(&id, &ActivityError::not_found(ReserveInventoryActivity::TYPE));

        assert!(matches!(
            actions.as_slice(),
            [WorkflowAction::FailWorkflow { error }] if error.code.as_deref() == Some("ACTIVITY_NOT_FOUND")
        ));
        assert!(workflow.is_finished());
    }

    #[test]
    fn test_bad_output_and_unexpected_results_fail() {
        let (mut workflow, actions) = start("Car", 1);
        let actions = drive(&mut workflow, actions, &[(NotifyActivity::TYPE, Value::Null)]);

        let (id, _, _) = scheduled(&actions);
        let actions = workflow.on_activity_completed(&id, json!("not an inventory result"));
        assert!(matches!(
            actions.as_slice(),
            [WorkflowAction::FailWorkflow { error }] if error.code.as_deref() == Some(INVALID_OUTPUT_CODE)
        ));

        let (mut workflow, _) = start("Car", 1);
        let actions = workflow.on_activity_completed(activity_ids::PROCESS_PAYMENT, json!(true));
        assert!(matches!(
            actions.as_slice(),
            [WorkflowAction::FailWorkflow { error }] if error.code.as_deref() == Some(UNEXPECTED_ACTIVITY_CODE)
        ));
    }
}

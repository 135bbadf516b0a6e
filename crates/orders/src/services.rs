// Wiring of the order sample into an engine

use std::sync::Arc;
use std::time::Duration;

use orderflow_durable::engine::{EngineError, WorkflowEngine};
use orderflow_durable::persistence::InstanceStore;

use crate::activities::{
    NotificationLog, NotifyActivity, ProcessPaymentActivity, ReserveInventoryActivity,
    UpdateInventoryActivity,
};
use crate::config::OrderServicesConfig;
use crate::inventory::InventoryService;
use crate::payment::{PaymentProcessor, SimulatedPaymentProcessor};
use crate::workflow::OrderProcessingWorkflow;

/// Shared dependencies of the order activities
#[derive(Clone)]
pub struct OrderServices {
    pub inventory: InventoryService,
    pub notifications: NotificationLog,
    pub payments: Arc<dyn PaymentProcessor>,
    pub inventory_update_delay: Duration,
}

impl OrderServices {
    /// Services backed by the simulated payment gateway
    pub fn new(inventory: InventoryService, config: &OrderServicesConfig) -> Self {
        Self {
            inventory,
            notifications: NotificationLog::new(),
            payments: Arc::new(SimulatedPaymentProcessor::new(
                config.payment_delay,
                config.approve_payments,
            )),
            inventory_update_delay: config.inventory_update_delay,
        }
    }

    pub fn with_payment_processor(mut self, processor: impl PaymentProcessor) -> Self {
        self.payments = Arc::new(processor);
        self
    }
}

impl std::fmt::Debug for OrderServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderServices")
            .field("inventory", &self.inventory)
            .field("notifications", &self.notifications.len())
            .field("inventory_update_delay", &self.inventory_update_delay)
            .finish_non_exhaustive()
    }
}

/// Register [`OrderProcessingWorkflow`] and its four activities
pub fn register_order_processing<S: InstanceStore>(
    engine: &WorkflowEngine<S>,
    services: &OrderServices,
) -> Result<(), EngineError> {
    engine.register_workflow::<OrderProcessingWorkflow>()?;
    engine.register_activity(NotifyActivity::new(services.notifications.clone()))?;
    engine.register_activity(ReserveInventoryActivity::new(services.inventory.clone()))?;
    engine.register_activity(ProcessPaymentActivity::new(Arc::clone(&services.payments)))?;
    engine.register_activity(UpdateInventoryActivity::new(
        services.inventory.clone(),
        services.inventory_update_delay,
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_durable::prelude::*;

    #[test]
    fn test_register_order_processing() {
        let engine = WorkflowEngine::new(InMemoryInstanceStore::new(), EngineConfig::default());
        let services = OrderServices::new(InventoryService::seeded(), &OrderServicesConfig::instant());

        register_order_processing(&engine, &services).unwrap();

        assert!(engine.workflows().contains("OrderProcessingWorkflow"));
        assert_eq!(
            engine.activities().activity_types(),
            vec![
                "NotifyActivity",
                "ProcessPaymentActivity",
                "ReserveInventoryActivity",
                "UpdateInventoryActivity",
            ]
        );

        assert!(register_order_processing(&engine, &services).is_err());
    }
}

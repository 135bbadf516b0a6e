// Order-processing sample for the durable engine
//
// A customer order runs as an OrderProcessingWorkflow instance:
//
//   notify received -> reserve inventory -> process payment
//     -> update inventory -> notify completed
//
// Inventory and payment are in-process simulations so the sample runs with
// no external services.

pub mod activities;
pub mod config;
pub mod inventory;
pub mod models;
pub mod payment;
pub mod services;
pub mod workflow;

pub use activities::{
    NotificationLog, NotifyActivity, ProcessPaymentActivity, ReserveInventoryActivity,
    UpdateInventoryActivity,
};
pub use config::OrderServicesConfig;
pub use inventory::InventoryService;
pub use models::{
    InventoryItem, InventoryRequest, InventoryResult, Notification, OrderPayload, OrderResult,
    PaymentRequest,
};
pub use payment::{PaymentProcessor, SimulatedPaymentProcessor};
pub use services::{register_order_processing, OrderServices};
pub use workflow::OrderProcessingWorkflow;

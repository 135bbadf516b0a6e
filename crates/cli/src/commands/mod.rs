// CLI commands

pub mod instances;
pub mod orders;

use anyhow::{Context, Result};
use orderflow_durable::engine::{EngineConfig, WorkflowClient, WorkflowEngine};
use orderflow_durable::persistence::InstanceStore;
use orderflow_orders::{register_order_processing, InventoryService, OrderServices, OrderServicesConfig};

use crate::output::OutputFormat;

/// Engine, order services and output settings shared by every command
pub struct App<S: InstanceStore> {
    pub client: WorkflowClient<S>,
    pub services: OrderServices,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl<S: InstanceStore> App<S> {
    pub fn new(store: S, inventory: InventoryService, output: OutputFormat, quiet: bool) -> Result<Self> {
        let engine = WorkflowEngine::new(store, EngineConfig::from_env());
        let services = OrderServices::new(inventory, &OrderServicesConfig::from_env());
        register_order_processing(&engine, &services).context("Failed to register order workflow")?;

        Ok(Self {
            client: WorkflowClient::new(engine),
            services,
            output,
            quiet,
        })
    }

    pub fn engine(&self) -> &WorkflowEngine<S> {
        self.client.engine()
    }
}

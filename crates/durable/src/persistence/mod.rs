//! Persistence layer for durable execution
//!
//! This module provides:
//! - [`InstanceStore`] trait for instance rows and their histories
//! - [`InMemoryInstanceStore`] for tests and single-process hosts
//! - [`PostgresInstanceStore`] for production

mod instance;
mod memory;
mod postgres;
mod store;

pub use instance::{
    status_from_history, HistoryOutcome, InstanceFilter, InstanceId, InstanceRecord, NewInstance,
    WorkflowInstance, WorkflowStatus, TERMINATED_CODE,
};
pub use memory::InMemoryInstanceStore;
pub use postgres::PostgresInstanceStore;
pub use store::{InstanceStore, StoreError};

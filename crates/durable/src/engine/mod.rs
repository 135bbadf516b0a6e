//! Workflow orchestration engine
//!
//! The engine module provides the [`WorkflowEngine`], which drives workflow
//! state machines through history replay and activity dispatch, and the
//! [`WorkflowClient`] façade hosts use to talk to it.

mod client;
mod config;
mod error;
mod executor;
mod registry;
mod replay;

pub use client::{ClientError, WorkflowClient, DEFAULT_TERMINATE_REASON};
pub use config::EngineConfig;
pub use error::{EngineError, ENGINE_ERROR_CODE};
pub use executor::WorkflowEngine;
pub use registry::{AnyWorkflow, RegistryError, WorkflowFactory, WorkflowRegistry};

//! # Durable Workflow Engine
//!
//! An embeddable orchestration engine that runs deterministic workflows as a
//! sequence of activities and persists every step, so instances survive a
//! process restart.
//!
//! ## Features
//!
//! - **Replay-based execution**: history is the source of truth; each resume
//!   rebuilds the workflow from scratch and never re-runs a recorded step
//! - **Pluggable storage**: in-memory for tests, PostgreSQL for production
//! - **Lifecycle controls**: wait for start or completion, terminate, purge
//! - **Opt-in retries**: per-activity retry policy and start-to-close timeout
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     WorkflowClient                           │
//! │  (schedule, status, wait, terminate by workflow name)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     WorkflowEngine                           │
//! │  (one driver per instance: replay → dispatch → record)      │
//! └─────────────────────────────────────────────────────────────┘
//!                │                                │
//!                ▼                                ▼
//! ┌───────────────────────────┐   ┌─────────────────────────────┐
//! │     ActivityRegistry      │   │        InstanceStore        │
//! │  (name → handler)         │   │  (instances + histories)    │
//! └───────────────────────────┘   └─────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use orderflow_durable::prelude::*;
//!
//! struct Greet {
//!     name: String,
//! }
//!
//! impl Workflow for Greet {
//!     const TYPE: &'static str = "Greet";
//!     type Input = String;
//!     type Output = String;
//!
//!     fn new(_ctx: &WorkflowContext, name: String) -> Self {
//!         Self { name }
//!     }
//!
//!     fn on_start(&mut self) -> Vec<WorkflowAction> {
//!         vec![WorkflowAction::schedule_activity("say-hello", "SayHello", json!(self.name))]
//!     }
//!
//!     // ... implement other trait methods
//! }
//! ```

pub mod activity;
pub mod engine;
pub mod persistence;
pub mod reliability;
pub mod workflow;

/// Prelude for common imports
pub mod prelude {
    pub use crate::activity::{Activity, ActivityContext, ActivityError};
    pub use crate::engine::{
        ClientError, EngineConfig, EngineError, WorkflowClient, WorkflowEngine,
    };
    pub use crate::persistence::{
        InMemoryInstanceStore, InstanceFilter, InstanceId, InstanceStore, PostgresInstanceStore,
        StoreError, WorkflowInstance, WorkflowStatus,
    };
    pub use crate::reliability::RetryPolicy;
    pub use crate::workflow::{
        ActivityOptions, HistoryEvent, Workflow, WorkflowAction, WorkflowContext, WorkflowError,
    };
    pub use serde_json::json;
}

// Re-export key types at crate root
pub use activity::{Activity, ActivityContext, ActivityError, ActivityRegistry};
pub use engine::{ClientError, EngineConfig, EngineError, WorkflowClient, WorkflowEngine};
pub use persistence::{
    InMemoryInstanceStore, InstanceId, InstanceStore, PostgresInstanceStore, StoreError,
    WorkflowInstance, WorkflowStatus,
};
pub use reliability::RetryPolicy;
pub use workflow::{
    ActivityOptions, HistoryEvent, HistoryRecord, Workflow, WorkflowAction, WorkflowContext,
    WorkflowError,
};

//! Workflow abstractions and types
//!
//! This module contains the core workflow primitives:
//! - [`Workflow`] trait for defining deterministic state machines
//! - [`WorkflowAction`] enum for workflow commands
//! - [`HistoryEvent`] enum for persisted events

mod action;
mod definition;
mod event;

pub use action::{ActivityOptions, WorkflowAction};
pub use definition::{Workflow, WorkflowContext, WorkflowError};
pub use event::{HistoryEvent, HistoryRecord};

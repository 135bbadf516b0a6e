//! Workflow trait definition

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::WorkflowAction;
use crate::activity::ActivityError;
use crate::persistence::InstanceId;

/// Error type for workflow failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowError {
    /// Error message
    pub message: String,

    /// Error code for programmatic handling
    pub code: Option<String>,
}

impl WorkflowError {
    /// Create a new workflow error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Set the error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<&ActivityError> for WorkflowError {
    fn from(err: &ActivityError) -> Self {
        let error = Self::new(err.message.clone());
        match &err.error_type {
            Some(code) => error.with_code(code.clone()),
            None => error,
        }
    }
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for WorkflowError {}

/// Deterministic data a workflow may read besides its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowContext {
    /// The instance being executed
    pub instance_id: InstanceId,
}

impl WorkflowContext {
    pub fn new(instance_id: InstanceId) -> Self {
        Self { instance_id }
    }
}

/// A workflow is a deterministic state machine driven by history events
///
/// Workflows define:
/// - How to start execution (`on_start`)
/// - How to react to activity results (`on_activity_completed`, `on_activity_failed`)
///
/// # Determinism
///
/// Given the same input and the same sequence of activity results, a workflow
/// must emit the same sequence of actions. The engine rebuilds every instance
/// from scratch on each resume and checks the emitted actions against the
/// recorded history. Clocks, randomness and I/O belong in activities.
///
/// # Example
///
/// ```ignore
/// use orderflow_durable::prelude::*;
///
/// struct GreetWorkflow {
///     name: String,
///     done: bool,
/// }
///
/// impl Workflow for GreetWorkflow {
///     const TYPE: &'static str = "GreetWorkflow";
///     type Input = String;
///     type Output = String;
///
///     fn new(_ctx: &WorkflowContext, input: Self::Input) -> Self {
///         Self { name: input, done: false }
///     }
///
///     fn on_start(&mut self) -> Vec<WorkflowAction> {
///         vec![WorkflowAction::schedule_activity("greet", "Greet", json!(self.name))]
///     }
///
///     // ... implement other methods
/// }
/// ```
pub trait Workflow: Send + Sync + 'static {
    /// Unique name for this workflow definition
    ///
    /// This is used to look up the workflow in the registry during replay.
    const TYPE: &'static str;

    /// Input type for starting the workflow
    type Input: Serialize + DeserializeOwned + Send + Clone;

    /// Output type when workflow completes
    type Output: Serialize + DeserializeOwned + Send;

    /// Create a new workflow instance from input
    ///
    /// This is called both when scheduling and on every replay.
    fn new(ctx: &WorkflowContext, input: Self::Input) -> Self;

    /// Called once at the beginning of every replay
    ///
    /// Return the first actions to perform.
    fn on_start(&mut self) -> Vec<WorkflowAction>;

    /// Called when an activity completes successfully
    ///
    /// The output is the JSON value returned by the activity (live or recorded).
    fn on_activity_completed(
        &mut self,
        activity_id: &str,
        output: serde_json::Value,
    ) -> Vec<WorkflowAction>;

    /// Called when an activity fails
    ///
    /// Returning `FailWorkflow` propagates the failure to the instance;
    /// anything else treats it as a handled branch.
    fn on_activity_failed(
        &mut self,
        activity_id: &str,
        error: &ActivityError,
    ) -> Vec<WorkflowAction>;
}

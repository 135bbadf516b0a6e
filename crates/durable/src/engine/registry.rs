//! Workflow registry for type-erased workflow creation
//!
//! The registry maps workflow type names to factories that build a fresh
//! state machine from JSON input. The engine calls it on every replay.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::activity::ActivityError;
use crate::workflow::{Workflow, WorkflowAction, WorkflowContext};

/// Type-erased workflow interface
///
/// This trait allows the engine to drive workflows without knowing their
/// concrete types. Activity results cross it as JSON.
pub trait AnyWorkflow: Send {
    fn workflow_type(&self) -> &'static str;

    fn on_start(&mut self) -> Vec<WorkflowAction>;

    fn on_activity_completed(&mut self, activity_id: &str, output: Value) -> Vec<WorkflowAction>;

    fn on_activity_failed(&mut self, activity_id: &str, error: &ActivityError)
        -> Vec<WorkflowAction>;
}

struct WorkflowWrapper<W: Workflow> {
    inner: W,
}

impl<W: Workflow> AnyWorkflow for WorkflowWrapper<W> {
    fn workflow_type(&self) -> &'static str {
        W::TYPE
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        self.inner.on_start()
    }

    fn on_activity_completed(&mut self, activity_id: &str, output: Value) -> Vec<WorkflowAction> {
        self.inner.on_activity_completed(activity_id, output)
    }

    fn on_activity_failed(
        &mut self,
        activity_id: &str,
        error: &ActivityError,
    ) -> Vec<WorkflowAction> {
        self.inner.on_activity_failed(activity_id, error)
    }
}

/// Factory function type for creating workflows from JSON input
pub type WorkflowFactory = Box<
    dyn Fn(&WorkflowContext, Value) -> Result<Box<dyn AnyWorkflow>, serde_json::Error>
        + Send
        + Sync,
>;

/// Registry of workflow factories keyed by `Workflow::TYPE`
#[derive(Default)]
pub struct WorkflowRegistry {
    factories: RwLock<HashMap<String, WorkflowFactory>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow type
    ///
    /// # Example
    ///
    /// ```ignore
    /// let registry = WorkflowRegistry::new();
    /// registry.register::<OrderProcessingWorkflow>()?;
    /// ```
    pub fn register<W: Workflow>(&self) -> Result<(), RegistryError> {
        let mut factories = self.factories.write();
        if factories.contains_key(W::TYPE) {
            return Err(RegistryError::DuplicateWorkflowType(W::TYPE.to_string()));
        }

        let factory: WorkflowFactory = Box::new(|ctx: &WorkflowContext, input: Value| {
            let typed_input: W::Input = serde_json::from_value(input)?;
            let workflow = W::new(ctx, typed_input);
            Ok(Box::new(WorkflowWrapper { inner: workflow }) as Box<dyn AnyWorkflow>)
        });

        factories.insert(W::TYPE.to_string(), factory);
        debug!(workflow_type = W::TYPE, "registered workflow");
        Ok(())
    }

    pub fn contains(&self, workflow_type: &str) -> bool {
        self.factories.read().contains_key(workflow_type)
    }

    /// Build a fresh state machine from type name and JSON input
    pub fn create(
        &self,
        workflow_type: &str,
        ctx: &WorkflowContext,
        input: Value,
    ) -> Result<Box<dyn AnyWorkflow>, RegistryError> {
        let factories = self.factories.read();
        let factory = factories
            .get(workflow_type)
            .ok_or_else(|| RegistryError::UnknownWorkflowType(workflow_type.to_string()))?;

        factory(ctx, input).map_err(|source| RegistryError::Deserialization {
            workflow_type: workflow_type.to_string(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }

    /// All registered workflow type names, sorted
    pub fn workflow_types(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflow_types", &self.workflow_types())
            .finish()
    }
}

/// Errors from workflow and activity registration
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Workflow type not registered
    #[error("unknown workflow type: {0}")]
    UnknownWorkflowType(String),

    #[error("workflow type already registered: {0}")]
    DuplicateWorkflowType(String),

    #[error("activity already registered: {0}")]
    DuplicateActivity(String),

    /// Failed to deserialize workflow input
    #[error("invalid input for workflow {workflow_type}: {source}")]
    Deserialization {
        workflow_type: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InstanceId;
    use crate::workflow::WorkflowError;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct DoubleInput {
        value: i32,
    }

    struct DoubleWorkflow {
        input: DoubleInput,
    }

    impl Workflow for DoubleWorkflow {
        const TYPE: &'static str = "double";
        type Input = DoubleInput;
        type Output = i32;

        fn new(_ctx: &WorkflowContext, input: Self::Input) -> Self {
            Self { input }
        }

        fn on_start(&mut self) -> Vec<WorkflowAction> {
            vec![WorkflowAction::schedule_activity(
                "compute",
                "Compute",
                json!({ "n": self.input.value }),
            )]
        }

        fn on_activity_completed(&mut self, _activity_id: &str, output: Value) -> Vec<WorkflowAction> {
            let n: i32 = serde_json::from_value(output).unwrap_or(0);
            vec![WorkflowAction::complete(json!(n * 2))]
        }

        fn on_activity_failed(&mut self, _activity_id: &str, error: &ActivityError) -> Vec<WorkflowAction> {
            vec![WorkflowAction::fail(WorkflowError::from(error))]
        }
    }

    fn ctx() -> WorkflowContext {
        WorkflowContext::new(InstanceId::from("wf-1"))
    }

    #[test]
    fn test_register_and_create() {
        let registry = WorkflowRegistry::new();
        registry.register::<DoubleWorkflow>().unwrap();

        assert!(registry.contains("double"));
        assert!(!registry.contains("unknown"));

        let mut workflow = registry.create("double", &ctx(), json!({ "value": 42 })).unwrap();
        assert_eq!(workflow.workflow_type(), "double");

        let actions = workflow.on_start();
        assert!(matches!(actions[0], WorkflowAction::ScheduleActivity { .. }));

        let actions = workflow.on_activity_completed("compute", json!(5));
        assert_eq!(actions, vec![WorkflowAction::complete(json!(10))]);
    }

    #[test]
    fn test_unknown_workflow_type() {
        let registry = WorkflowRegistry::new();
        let result = registry.create("unknown", &ctx(), json!({}));

        assert!(matches!(result, Err(RegistryError::UnknownWorkflowType(_))));
    }

    #[test]
    fn test_invalid_input() {
        let registry = WorkflowRegistry::new();
        registry.register::<DoubleWorkflow>().unwrap();

        let result = registry.create("double", &ctx(), json!({}));
        assert!(matches!(result, Err(RegistryError::Deserialization { .. })));
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = WorkflowRegistry::new();
        registry.register::<DoubleWorkflow>().unwrap();

        assert!(matches!(
            registry.register::<DoubleWorkflow>(),
            Err(RegistryError::DuplicateWorkflowType(_))
        ));
        assert_eq!(registry.workflow_types(), vec!["double"]);
        assert!(format!("{registry:?}").contains("double"));
    }
}

//! Client façade over the engine
//!
//! Hosts schedule and observe instances by workflow name through this type.
//! Unknown ids surface as `Ok(None)` instead of an error.

use std::time::Duration;

use serde::Serialize;

use super::{EngineError, WorkflowEngine};
use crate::persistence::{InstanceId, InstanceStore, WorkflowInstance};

/// Reason recorded by [`WorkflowClient::terminate`]
pub const DEFAULT_TERMINATE_REASON: &str = "terminated by client";

/// Errors returned to client callers
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] serde_json::Error),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Engine(e) if e.is_timeout())
    }
}

/// Schedule, query, wait on and stop workflow instances
#[derive(Clone)]
pub struct WorkflowClient<S: InstanceStore> {
    engine: WorkflowEngine<S>,
}

impl<S: InstanceStore> WorkflowClient<S> {
    pub fn new(engine: WorkflowEngine<S>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &WorkflowEngine<S> {
        &self.engine
    }

    /// Schedule `definition_name` with a generated instance id
    pub async fn schedule<I: Serialize>(
        &self,
        definition_name: &str,
        input: &I,
    ) -> Result<InstanceId, ClientError> {
        let input = serde_json::to_value(input)?;
        Ok(self
            .engine
            .schedule_workflow(definition_name, input, None)
            .await?)
    }

    /// Schedule `definition_name` under a caller-chosen id
    pub async fn schedule_with_id<I: Serialize>(
        &self,
        definition_name: &str,
        instance_id: impl Into<InstanceId>,
        input: &I,
    ) -> Result<InstanceId, ClientError> {
        let input = serde_json::to_value(input)?;
        Ok(self
            .engine
            .schedule_workflow(definition_name, input, Some(instance_id.into()))
            .await?)
    }

    /// Current state, or `None` for unknown ids
    pub async fn status(&self, instance_id: &InstanceId) -> Result<Option<WorkflowInstance>, ClientError> {
        found(self.engine.get_instance_state(instance_id).await)
    }

    /// Terminate with the default reason
    pub async fn terminate(&self, instance_id: &InstanceId) -> Result<Option<WorkflowInstance>, ClientError> {
        self.terminate_with_reason(instance_id, DEFAULT_TERMINATE_REASON)
            .await
    }

    pub async fn terminate_with_reason(
        &self,
        instance_id: &InstanceId,
        reason: &str,
    ) -> Result<Option<WorkflowInstance>, ClientError> {
        found(self.engine.terminate_workflow(instance_id, reason).await)
    }

    pub async fn wait_for_start(
        &self,
        instance_id: &InstanceId,
        timeout: Duration,
    ) -> Result<WorkflowInstance, ClientError> {
        Ok(self
            .engine
            .wait_for_instance_start(instance_id, timeout)
            .await?)
    }

    pub async fn wait_for_completion(
        &self,
        instance_id: &InstanceId,
        timeout: Duration,
    ) -> Result<WorkflowInstance, ClientError> {
        Ok(self
            .engine
            .wait_for_instance_completion(instance_id, timeout)
            .await?)
    }

    /// Delete a terminal instance; `false` for unknown ids
    pub async fn purge(&self, instance_id: &InstanceId) -> Result<bool, ClientError> {
        Ok(self.engine.purge_instance(instance_id).await?)
    }
}

fn found<T>(result: Result<T, EngineError>) -> Result<Option<T>, ClientError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

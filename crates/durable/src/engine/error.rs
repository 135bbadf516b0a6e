//! Engine error type

use std::time::Duration;

use super::RegistryError;
use crate::persistence::{InstanceId, StoreError};

/// Error code recorded on instances failed by the engine itself
pub const ENGINE_ERROR_CODE: &str = "ENGINE_ERROR";

/// Errors from engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Store error
    #[error("store error: {0}")]
    Store(StoreError),

    /// Registry error
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),

    /// A wait gave up; the instance itself is unaffected
    #[error("timed out after {timeout:?} waiting for instance {instance_id}")]
    Timeout {
        instance_id: InstanceId,
        timeout: Duration,
    },

    #[error("instance id already in use: {0}")]
    DuplicateInstanceId(InstanceId),

    /// Replay disagreed with the recorded history
    #[error("non-determinism in instance {instance_id}: {message}")]
    NonDeterminism {
        instance_id: InstanceId,
        message: String,
    },

    #[error("instance {instance_id} has too many events ({count} >= {limit})")]
    TooManyEvents {
        instance_id: InstanceId,
        count: usize,
        limit: usize,
    },

    #[error("instance {0} is not in a terminal state")]
    InstanceNotTerminal(InstanceId),

    /// Workflow code panicked while the driver was replaying it
    #[error("driver panicked: {0}")]
    DriverPanicked(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InstanceNotFound(id) => Self::InstanceNotFound(id),
            StoreError::DuplicateInstance(id) => Self::DuplicateInstanceId(id),
            other => Self::Store(other),
        }
    }
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InstanceNotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

//! InstanceStore trait definition

use async_trait::async_trait;

use super::{InstanceFilter, InstanceId, InstanceRecord, NewInstance, WorkflowStatus};
use crate::workflow::{HistoryEvent, HistoryRecord, WorkflowError};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Instance not found
    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),

    /// An instance with this id already exists
    #[error("instance already exists: {0}")]
    DuplicateInstance(InstanceId),

    /// Concurrency conflict (optimistic locking failed)
    #[error("concurrency conflict: expected sequence {expected}, got {actual}")]
    ConcurrencyConflict { expected: u64, actual: u64 },

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable storage for instance rows and their append-only histories
///
/// Implementations must be thread-safe. Appends to one instance are
/// serialized through `expected_sequence`; different instances never
/// contend with each other.
#[async_trait]
pub trait InstanceStore: Send + Sync + 'static {
    /// Create a `Pending` instance and record `WorkflowStarted` at sequence 0
    async fn create_instance(&self, instance: NewInstance) -> Result<(), StoreError>;

    /// Append one event at `expected_sequence`
    ///
    /// Returns the sequence the next event must use.
    async fn append(
        &self,
        instance_id: &InstanceId,
        expected_sequence: u64,
        event: HistoryEvent,
    ) -> Result<u64, StoreError>;

    /// Load the full history in sequence order (for replay)
    async fn read_history(&self, instance_id: &InstanceId) -> Result<Vec<HistoryRecord>, StoreError>;

    /// Update status, output and error together
    async fn set_status(
        &self,
        instance_id: &InstanceId,
        status: WorkflowStatus,
        output: Option<serde_json::Value>,
        error: Option<WorkflowError>,
    ) -> Result<(), StoreError>;

    async fn get_status(&self, instance_id: &InstanceId) -> Result<WorkflowStatus, StoreError>;

    async fn get_instance(&self, instance_id: &InstanceId) -> Result<InstanceRecord, StoreError>;

    /// List instances matching the filter, oldest first
    async fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRecord>, StoreError>;

    /// Delete an instance and its history; `false` if it did not exist
    async fn purge(&self, instance_id: &InstanceId) -> Result<bool, StoreError>;
}

#[async_trait]
impl<T: InstanceStore + ?Sized> InstanceStore for std::sync::Arc<T> {
    async fn create_instance(&self, instance: NewInstance) -> Result<(), StoreError> {
        (**self).create_instance(instance).await
    }

    async fn append(
        &self,
        instance_id: &InstanceId,
        expected_sequence: u64,
        event: HistoryEvent,
    ) -> Result<u64, StoreError> {
        (**self).append(instance_id, expected_sequence, event).await
    }

    async fn read_history(&self, instance_id: &InstanceId) -> Result<Vec<HistoryRecord>, StoreError> {
        (**self).read_history(instance_id).await
    }

    async fn set_status(
        &self,
        instance_id: &InstanceId,
        status: WorkflowStatus,
        output: Option<serde_json::Value>,
        error: Option<WorkflowError>,
    ) -> Result<(), StoreError> {
        (**self).set_status(instance_id, status, output, error).await
    }

    async fn get_status(&self, instance_id: &InstanceId) -> Result<WorkflowStatus, StoreError> {
        (**self).get_status(instance_id).await
    }

    async fn get_instance(&self, instance_id: &InstanceId) -> Result<InstanceRecord, StoreError> {
        (**self).get_instance(instance_id).await
    }

    async fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRecord>, StoreError> {
        (**self).list_instances(filter).await
    }

    async fn purge(&self, instance_id: &InstanceId) -> Result<bool, StoreError> {
        (**self).purge(instance_id).await
    }
}

//! In-memory implementation of InstanceStore

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use super::store::{InstanceStore, StoreError};
use super::{InstanceFilter, InstanceId, InstanceRecord, NewInstance, WorkflowStatus};
use crate::workflow::{HistoryEvent, HistoryRecord, WorkflowError};

struct InstanceState {
    record: InstanceRecord,
    history: Vec<HistoryRecord>,
}

/// In-memory implementation of InstanceStore
///
/// Used by tests and single-process hosts. It provides the same semantics as
/// the PostgreSQL implementation; share it through an `Arc` to let a fresh
/// engine pick up where a dropped one stopped.
///
/// # Example
///
/// ```
/// use orderflow_durable::InMemoryInstanceStore;
///
/// let store = InMemoryInstanceStore::new();
/// assert_eq!(store.instance_count(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryInstanceStore {
    instances: RwLock<HashMap<InstanceId, InstanceState>>,
}

impl InMemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored instances
    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn create_instance(&self, instance: NewInstance) -> Result<(), StoreError> {
        let mut instances = self.instances.write();
        if instances.contains_key(&instance.instance_id) {
            return Err(StoreError::DuplicateInstance(instance.instance_id));
        }

        let now = Utc::now();
        let started = HistoryRecord {
            sequence: 0,
            event: HistoryEvent::WorkflowStarted {
                input: instance.input.clone(),
            },
            recorded_at: now,
        };

        debug!(instance_id = %instance.instance_id, workflow_type = %instance.workflow_type, "created instance");
        instances.insert(
            instance.instance_id.clone(),
            InstanceState {
                record: InstanceRecord {
                    instance_id: instance.instance_id,
                    workflow_type: instance.workflow_type,
                    status: WorkflowStatus::Pending,
                    input: instance.input,
                    output: None,
                    error: None,
                    created_at: now,
                    updated_at: now,
                },
                history: vec![started],
            },
        );
        Ok(())
    }

    async fn append(
        &self,
        instance_id: &InstanceId,
        expected_sequence: u64,
        event: HistoryEvent,
    ) -> Result<u64, StoreError> {
        let mut instances = self.instances.write();
        let state = instances
            .get_mut(instance_id)
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.clone()))?;

        let current = state.history.len() as u64;
        if current != expected_sequence {
            return Err(StoreError::ConcurrencyConflict {
                expected: expected_sequence,
                actual: current,
            });
        }

        state.history.push(HistoryRecord {
            sequence: current,
            event,
            recorded_at: Utc::now(),
        });
        state.record.updated_at = Utc::now();
        Ok(current + 1)
    }

    async fn read_history(&self, instance_id: &InstanceId) -> Result<Vec<HistoryRecord>, StoreError> {
        self.instances
            .read()
            .get(instance_id)
            .map(|s| s.history.clone())
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.clone()))
    }

    async fn set_status(
        &self,
        instance_id: &InstanceId,
        status: WorkflowStatus,
        output: Option<serde_json::Value>,
        error: Option<WorkflowError>,
    ) -> Result<(), StoreError> {
        let mut instances = self.instances.write();
        let state = instances
            .get_mut(instance_id)
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.clone()))?;

        state.record.status = status;
        state.record.output = output;
        state.record.error = error;
        state.record.updated_at = Utc::now();
        Ok(())
    }

    async fn get_status(&self, instance_id: &InstanceId) -> Result<WorkflowStatus, StoreError> {
        self.instances
            .read()
            .get(instance_id)
            .map(|s| s.record.status)
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.clone()))
    }

    async fn get_instance(&self, instance_id: &InstanceId) -> Result<InstanceRecord, StoreError> {
        self.instances
            .read()
            .get(instance_id)
            .map(|s| s.record.clone())
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.clone()))
    }

    async fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRecord>, StoreError> {
        let mut records: Vec<InstanceRecord> = self
            .instances
            .read()
            .values()
            .filter(|s| filter.matches(&s.record))
            .map(|s| s.record.clone())
            .collect();

        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.instance_id.cmp(&b.instance_id))
        });
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn purge(&self, instance_id: &InstanceId) -> Result<bool, StoreError> {
        Ok(self.instances.write().remove(instance_id).is_some())
    }
}

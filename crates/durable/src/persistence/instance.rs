//! Instance identity, status and the records a store keeps per instance

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{HistoryEvent, HistoryRecord, WorkflowError};

/// Error code recorded on instances stopped by `terminate_workflow`
pub const TERMINATED_CODE: &str = "TERMINATED";

/// Unique identifier of a workflow instance
///
/// Either supplied by the caller or generated by the engine. Generated ids
/// are UUID v7, so they sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a fresh, time-ordered id
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Scheduled, driver not yet started
    Pending,

    /// Driver is executing steps
    Running,

    /// Workflow emitted a completion (including business failures)
    Completed,

    /// An uncaught activity error or an engine fault ended the instance
    Failed,

    /// Stopped by a caller
    Terminated,
}

impl WorkflowStatus {
    /// Completed, failed and terminated instances never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Terminated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "terminated" => Ok(Self::Terminated),
            other => Err(format!("unknown workflow status: {other}")),
        }
    }
}

/// Everything needed to create an instance
///
/// Stores persist the row together with the `WorkflowStarted` event at
/// sequence 0, so an instance never exists without its input in history.
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub instance_id: InstanceId,
    pub workflow_type: String,
    pub input: serde_json::Value,
}

/// Instance row without its history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: InstanceId,
    pub workflow_type: String,
    pub status: WorkflowStatus,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error: Option<WorkflowError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full instance state as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub instance_id: InstanceId,
    pub workflow_type: String,
    pub status: WorkflowStatus,
    pub input: serde_json::Value,

    /// Present once the workflow completed with a result
    pub output: Option<serde_json::Value>,

    /// Present for failed and terminated instances
    pub error: Option<WorkflowError>,

    pub history: Vec<HistoryRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    pub fn from_parts(record: InstanceRecord, history: Vec<HistoryRecord>) -> Self {
        Self {
            instance_id: record.instance_id,
            workflow_type: record.workflow_type,
            status: record.status,
            input: record.input,
            output: record.output,
            error: record.error,
            history,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Decode the output into a concrete type
    pub fn output_as<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.output.clone().map(serde_json::from_value)
    }

    /// Count history events matching a predicate
    pub fn count_events(&self, predicate: impl Fn(&HistoryEvent) -> bool) -> usize {
        self.history.iter().filter(|r| predicate(&r.event)).count()
    }
}

/// Filter for listing instances
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub workflow_type: Option<String>,

    /// Empty means any status
    pub statuses: Vec<WorkflowStatus>,

    pub limit: Option<usize>,
}

impl InstanceFilter {
    /// Instances a crashed process may have left unfinished
    pub fn non_terminal() -> Self {
        Self {
            statuses: vec![WorkflowStatus::Pending, WorkflowStatus::Running],
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_workflow_type(mut self, workflow_type: impl Into<String>) -> Self {
        self.workflow_type = Some(workflow_type.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &InstanceRecord) -> bool {
        let type_ok = self
            .workflow_type
            .as_deref()
            .map_or(true, |t| t == record.workflow_type);
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&record.status);
        type_ok && status_ok
    }
}

/// Status, output and error implied by a history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryOutcome {
    pub status: WorkflowStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<WorkflowError>,
}

/// Re-derive what the instance row should say from its history alone
///
/// A terminal event decides the status. Otherwise an instance with any
/// activity event recorded is running, and one with only its start event
/// is pending.
pub fn status_from_history(history: &[HistoryRecord]) -> HistoryOutcome {
    let terminal = history.iter().rev().find(|r| r.event.is_terminal());

    match terminal.map(|r| &r.event) {
        Some(HistoryEvent::WorkflowCompleted { result }) => HistoryOutcome {
            status: WorkflowStatus::Completed,
            output: Some(result.clone()),
            error: None,
        },
        Some(HistoryEvent::WorkflowFailed { error }) => HistoryOutcome {
            status: WorkflowStatus::Failed,
            output: None,
            error: Some(error.clone()),
        },
        Some(HistoryEvent::WorkflowTerminated { reason }) => HistoryOutcome {
            status: WorkflowStatus::Terminated,
            output: None,
            error: Some(WorkflowError::new(reason.clone()).with_code(TERMINATED_CODE)),
        },
        _ => {
            let started = history.iter().any(|r| r.event.activity_id().is_some());
            HistoryOutcome {
                status: if started {
                    WorkflowStatus::Running
                } else {
                    WorkflowStatus::Pending
                },
                output: None,
                error: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::ActivityOptions;
    use serde_json::json;

    fn record(sequence: u64, event: HistoryEvent) -> HistoryRecord {
        HistoryRecord {
            sequence,
            event,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = InstanceId::generate();
        let b = InstanceId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [
            WorkflowStatus::Pending,
            WorkflowStatus::Running,
            WorkflowStatus::Completed,
            WorkflowStatus::Failed,
            WorkflowStatus::Terminated,
        ] {
            assert_eq!(status.as_str().parse::<WorkflowStatus>(), Ok(status));
        }
        assert!("cancelled".parse::<WorkflowStatus>().is_err());
    }

    #[test]
    fn test_status_from_history() {
        let mut history = vec![record(0, HistoryEvent::WorkflowStarted { input: json!({}) })];
        assert_eq!(status_from_history(&history).status, WorkflowStatus::Pending);

        history.push(record(
            1,
            HistoryEvent::ActivityScheduled {
                activity_id: "step-1".into(),
                activity_type: "Notify".into(),
                input: json!({}),
                options: ActivityOptions::default(),
            },
        ));
        assert_eq!(status_from_history(&history).status, WorkflowStatus::Running);

        history.push(record(
            2,
            HistoryEvent::WorkflowTerminated {
                reason: "operator".into(),
            },
        ));
        let outcome = status_from_history(&history);
        assert_eq!(outcome.status, WorkflowStatus::Terminated);
        assert_eq!(
            outcome.error.and_then(|e| e.code).as_deref(),
            Some(TERMINATED_CODE)
        );
    }

    #[test]
    fn test_filter_matches() {
        let now = Utc::now();
        let record = InstanceRecord {
            instance_id: "a".into(),
            workflow_type: "OrderProcessingWorkflow".into(),
            status: WorkflowStatus::Running,
            input: json!({}),
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        assert!(InstanceFilter::default().matches(&record));
        assert!(InstanceFilter::non_terminal().matches(&record));
        assert!(!InstanceFilter::default()
            .with_status(WorkflowStatus::Completed)
            .matches(&record));
        assert!(!InstanceFilter::default()
            .with_workflow_type("Other")
            .matches(&record));
    }
}

//! History events for persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActivityOptions, WorkflowError};
use crate::activity::ActivityError;

/// Events stored in an instance's history
///
/// These events form the append-only log for an instance. They are used for:
/// - Persisting workflow progress
/// - Replaying workflows after recovery
/// - Auditing and debugging
///
/// Events are immutable once written. The workflow state is reconstructed
/// by replaying all events in sequence order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    // =========================================================================
    // Workflow Lifecycle Events
    // =========================================================================
    /// Instance was scheduled with the given input
    WorkflowStarted {
        /// The input provided when scheduling the workflow
        input: serde_json::Value,
    },

    /// Workflow completed successfully
    WorkflowCompleted {
        /// The result value
        result: serde_json::Value,
    },

    /// Workflow failed with an error
    WorkflowFailed {
        /// Error details
        error: WorkflowError,
    },

    /// Instance was terminated by a caller
    WorkflowTerminated {
        /// Reason for termination
        reason: String,
    },

    // =========================================================================
    // Activity Lifecycle Events
    // =========================================================================
    /// Activity was scheduled for execution
    ActivityScheduled {
        /// Unique activity identifier within the workflow
        activity_id: String,

        /// Type of activity to execute
        activity_type: String,

        /// Input for the activity
        input: serde_json::Value,

        /// Execution options
        options: ActivityOptions,
    },

    /// Activity completed successfully
    ActivityCompleted {
        /// Activity identifier
        activity_id: String,

        /// Output returned by the activity
        output: serde_json::Value,
    },

    /// Activity failed after exhausting its attempts
    ActivityFailed {
        /// Activity identifier
        activity_id: String,

        /// Error details
        error: ActivityError,
    },
}

impl HistoryEvent {
    /// Get the activity_id if this is an activity-related event
    pub fn activity_id(&self) -> Option<&str> {
        match self {
            Self::ActivityScheduled { activity_id, .. }
            | Self::ActivityCompleted { activity_id, .. }
            | Self::ActivityFailed { activity_id, .. } => Some(activity_id),
            _ => None,
        }
    }

    /// Check if this is a terminal workflow event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::WorkflowCompleted { .. }
                | Self::WorkflowFailed { .. }
                | Self::WorkflowTerminated { .. }
        )
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WorkflowStarted { .. } => "workflow_started",
            Self::WorkflowCompleted { .. } => "workflow_completed",
            Self::WorkflowFailed { .. } => "workflow_failed",
            Self::WorkflowTerminated { .. } => "workflow_terminated",
            Self::ActivityScheduled { .. } => "activity_scheduled",
            Self::ActivityCompleted { .. } => "activity_completed",
            Self::ActivityFailed { .. } => "activity_failed",
        }
    }
}

/// A persisted history event with its position in the log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    /// 0-based, dense position within the instance's history
    pub sequence: u64,

    pub event: HistoryEvent,

    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_event_serialization() {
        let event = HistoryEvent::WorkflowStarted {
            input: json!({"name": "Car", "quantity": 10}),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"workflow_started\""));

        let parsed: HistoryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }

    #[test]
    fn test_activity_failed_keeps_error() {
        let event = HistoryEvent::ActivityFailed {
            activity_id: "step-1".to_string(),
            error: ActivityError::not_found("Missing"),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["error"]["error_type"], "ACTIVITY_NOT_FOUND");
        assert_eq!(event.activity_id(), Some("step-1"));
        assert_eq!(event.kind(), "activity_failed");
    }

    #[test]
    fn test_is_terminal() {
        assert!(HistoryEvent::WorkflowCompleted { result: json!({}) }.is_terminal());
        assert!(HistoryEvent::WorkflowFailed {
            error: WorkflowError::new("error")
        }
        .is_terminal());
        assert!(HistoryEvent::WorkflowTerminated {
            reason: "stop".to_string()
        }
        .is_terminal());

        assert!(!HistoryEvent::WorkflowStarted { input: json!({}) }.is_terminal());
        assert!(!HistoryEvent::ActivityCompleted {
            activity_id: "x".to_string(),
            output: json!({})
        }
        .is_terminal());
    }
}

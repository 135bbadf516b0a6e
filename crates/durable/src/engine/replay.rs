//! Deterministic replay of an instance history
//!
//! Replay rebuilds a workflow from its recorded input, feeds it every
//! recorded activity result in sequence order and checks that the steps it
//! asks for match the steps already recorded. The outcome is the one thing
//! the driver has to do next.

use std::collections::VecDeque;

use serde_json::Value;

use super::registry::AnyWorkflow;
use super::EngineError;
use crate::persistence::InstanceId;
use crate::workflow::{ActivityOptions, HistoryEvent, HistoryRecord, WorkflowAction, WorkflowError};

/// An activity step the driver must run
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingStep {
    pub activity_id: String,
    pub activity_type: String,
    pub input: Value,

    /// Options the workflow asked for; `None` means the engine defaults
    pub options: Option<ActivityOptions>,

    /// `ActivityScheduled` is already in history (crash before its result)
    pub recorded: bool,
}

/// What the driver has to do after replay
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NextStep {
    Dispatch(PendingStep),
    Complete(Value),
    Fail(WorkflowError),

    /// History already ends the instance
    Finished,

    /// The workflow is waiting on nothing and asked for nothing
    Stalled,
}

/// Replay `history` against a freshly created workflow
pub(crate) fn replay(
    instance_id: &InstanceId,
    workflow: &mut dyn AnyWorkflow,
    history: &[HistoryRecord],
) -> Result<NextStep, EngineError> {
    let non_determinism = |message: String| EngineError::NonDeterminism {
        instance_id: instance_id.clone(),
        message,
    };

    let mut records = history.iter();
    match records.next().map(|r| &r.event) {
        Some(HistoryEvent::WorkflowStarted { .. }) => {}
        _ => return Err(non_determinism("history must begin with workflow_started".into())),
    }

    let mut pending: VecDeque<WorkflowAction> = workflow.on_start().into();
    let mut in_flight: Option<PendingStep> = None;

    for record in records {
        match &record.event {
            HistoryEvent::WorkflowStarted { .. } => {
                return Err(non_determinism(format!(
                    "unexpected workflow_started at sequence {}",
                    record.sequence
                )));
            }

            HistoryEvent::ActivityScheduled {
                activity_id,
                activity_type,
                input,
                options,
            } => {
                if let Some(step) = &in_flight {
                    return Err(non_determinism(format!(
                        "step {activity_id} scheduled while {} has no result",
                        step.activity_id
                    )));
                }

                match pending.pop_front() {
                    Some(WorkflowAction::ScheduleActivity {
                        activity_id: expected_id,
                        activity_type: expected_type,
                        ..
                    }) if &expected_id == activity_id && &expected_type == activity_type => {}
                    other => {
                        return Err(non_determinism(format!(
                            "history has step {activity_id} ({activity_type}) at sequence {} but workflow produced {}",
                            record.sequence,
                            describe(other.as_ref())
                        )));
                    }
                }

                in_flight = Some(PendingStep {
                    activity_id: activity_id.clone(),
                    activity_type: activity_type.clone(),
                    input: input.clone(),
                    options: Some(options.clone()),
                    recorded: true,
                });
            }

            HistoryEvent::ActivityCompleted { activity_id, output } => {
                take_in_flight(&mut in_flight, activity_id).map_err(non_determinism)?;
                pending.extend(workflow.on_activity_completed(activity_id, output.clone()));
            }

            HistoryEvent::ActivityFailed { activity_id, error } => {
                take_in_flight(&mut in_flight, activity_id).map_err(non_determinism)?;
                pending.extend(workflow.on_activity_failed(activity_id, error));
            }

            HistoryEvent::WorkflowCompleted { .. }
            | HistoryEvent::WorkflowFailed { .. }
            | HistoryEvent::WorkflowTerminated { .. } => return Ok(NextStep::Finished),
        }
    }

    if let Some(step) = in_flight {
        return Ok(NextStep::Dispatch(step));
    }

    Ok(match pending.pop_front() {
        Some(WorkflowAction::ScheduleActivity {
            activity_id,
            activity_type,
            input,
            options,
        }) => NextStep::Dispatch(PendingStep {
            activity_id,
            activity_type,
            input,
            options,
            recorded: false,
        }),
        Some(WorkflowAction::CompleteWorkflow { result }) => NextStep::Complete(result),
        Some(WorkflowAction::FailWorkflow { error }) => NextStep::Fail(error),
        None => NextStep::Stalled,
    })
}

fn take_in_flight(in_flight: &mut Option<PendingStep>, activity_id: &str) -> Result<(), String> {
    match in_flight.take() {
        Some(step) if step.activity_id == activity_id => Ok(()),
        Some(step) => Err(format!(
            "result for {activity_id} recorded while {} was running",
            step.activity_id
        )),
        None => Err(format!("result for {activity_id} recorded without a schedule")),
    }
}

fn describe(action: Option<&WorkflowAction>) -> String {
    match action {
        Some(WorkflowAction::ScheduleActivity {
            activity_id,
            activity_type,
            ..
        }) => format!("step {activity_id} ({activity_type})"),
        Some(WorkflowAction::CompleteWorkflow { .. }) => "a completion".to_string(),
        Some(WorkflowAction::FailWorkflow { .. }) => "a failure".to_string(),
        None => "no action".to_string(),
    }
}

//! Workflow engine with replay-driven execution
//!
//! The `WorkflowEngine` is responsible for:
//! - Scheduling new instances and spawning one driver per instance
//! - Replaying instances from history and dispatching the next step
//! - Recording activity results before acting on them
//! - Waiting, querying, terminating and purging instances
//! - Resuming unfinished instances after a restart

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use super::registry::WorkflowRegistry;
use super::replay::{replay, NextStep, PendingStep};
use super::{EngineConfig, EngineError, ENGINE_ERROR_CODE};
use crate::activity::{
    error_types, Activity, ActivityContext, ActivityError, ActivityRegistry, ActivityResult,
    CancellationHandle,
};
use crate::persistence::{
    status_from_history, InstanceFilter, InstanceId, InstanceRecord, InstanceStore, NewInstance,
    StoreError, WorkflowInstance, WorkflowStatus, TERMINATED_CODE,
};
use crate::workflow::{ActivityOptions, HistoryEvent, Workflow, WorkflowContext, WorkflowError};

/// Orchestration engine
///
/// Cheap to clone; clones share registries, store and running drivers.
///
/// # Example
///
/// ```ignore
/// use orderflow_durable::prelude::*;
///
/// let engine = WorkflowEngine::new(InMemoryInstanceStore::new(), EngineConfig::default());
/// engine.register_workflow::<MyWorkflow>()?;
/// engine.register_activity(MyActivity)?;
///
/// let id = engine.schedule_new_workflow::<MyWorkflow>(input).await?;
/// let state = engine
///     .wait_for_instance_completion(&id, Duration::from_secs(30))
///     .await?;
/// ```
pub struct WorkflowEngine<S: InstanceStore> {
    inner: Arc<EngineInner<S>>,
}

impl<S: InstanceStore> Clone for WorkflowEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<S> {
    store: S,
    config: EngineConfig,
    workflows: WorkflowRegistry,
    activities: ActivityRegistry,

    /// Bounds concurrently driven instances
    slots: Arc<Semaphore>,

    /// Single-writer lock per instance, shared by its driver and terminate
    locks: DashMap<InstanceId, Arc<Mutex<()>>>,

    /// Cancellation handles of instances with a live driver
    drivers: DashMap<InstanceId, CancellationHandle>,

    /// Latest known status per instance, for waiters
    watchers: DashMap<InstanceId, Arc<watch::Sender<WorkflowStatus>>>,
}

impl<S: InstanceStore> WorkflowEngine<S> {
    /// Create a new engine over the given store
    pub fn new(store: S, config: EngineConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_instances.max(1)));
        Self {
            inner: Arc::new(EngineInner {
                store,
                config,
                workflows: WorkflowRegistry::new(),
                activities: ActivityRegistry::new(),
                slots,
                locks: DashMap::new(),
                drivers: DashMap::new(),
                watchers: DashMap::new(),
            }),
        }
    }

    /// Register a workflow type
    pub fn register_workflow<W: Workflow>(&self) -> Result<(), EngineError> {
        self.inner.workflows.register::<W>()?;
        info!(workflow_type = W::TYPE, "registered workflow type");
        Ok(())
    }

    /// Register a typed activity under `A::TYPE`
    pub fn register_activity<A: Activity>(&self, activity: A) -> Result<(), EngineError> {
        self.inner.activities.register(activity)?;
        info!(activity_type = A::TYPE, "registered activity");
        Ok(())
    }

    /// Register a JSON activity handler under an explicit name
    pub fn register_activity_fn<F, Fut>(&self, activity_type: &str, handler: F) -> Result<(), EngineError>
    where
        F: Fn(ActivityContext, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ActivityResult> + Send + 'static,
    {
        self.inner.activities.register_fn(activity_type, handler)?;
        info!(%activity_type, "registered activity");
        Ok(())
    }

    /// Get a reference to the store
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn workflows(&self) -> &WorkflowRegistry {
        &self.inner.workflows
    }

    pub fn activities(&self) -> &ActivityRegistry {
        &self.inner.activities
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Schedule a new instance of `W` under a generated id
    pub async fn schedule_new_workflow<W: Workflow>(
        &self,
        input: W::Input,
    ) -> Result<InstanceId, EngineError> {
        let input = serde_json::to_value(&input)?;
        self.schedule_workflow(W::TYPE, input, None).await
    }

    /// Schedule a new instance by workflow name
    ///
    /// Validates the type and input, persists the instance as `Pending` with
    /// its `WorkflowStarted` event, spawns its driver and returns without
    /// waiting for any step to run.
    #[instrument(skip(self, input))]
    pub async fn schedule_workflow(
        &self,
        workflow_type: &str,
        input: Value,
        instance_id: Option<InstanceId>,
    ) -> Result<InstanceId, EngineError> {
        let instance_id = instance_id.unwrap_or_else(InstanceId::generate);

        // Fail fast on unknown types and bad input
        self.inner.workflows.create(
            workflow_type,
            &WorkflowContext::new(instance_id.clone()),
            input.clone(),
        )?;

        self.inner
            .store
            .create_instance(NewInstance {
                instance_id: instance_id.clone(),
                workflow_type: workflow_type.to_string(),
                input,
            })
            .await?;

        info!(%instance_id, "scheduled workflow instance");
        self.publish(&instance_id, WorkflowStatus::Pending);
        self.spawn_driver(instance_id.clone());
        Ok(instance_id)
    }

    // =========================================================================
    // Queries and waits
    // =========================================================================

    /// Current state of an instance, history included
    pub async fn get_instance_state(&self, instance_id: &InstanceId) -> Result<WorkflowInstance, EngineError> {
        let record = self.inner.store.get_instance(instance_id).await?;
        let history = self.inner.store.read_history(instance_id).await?;
        Ok(WorkflowInstance::from_parts(record, history))
    }

    /// List instance rows matching a filter
    pub async fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRecord>, EngineError> {
        Ok(self.inner.store.list_instances(filter).await?)
    }

    /// Wait until the instance has left `Pending`
    #[instrument(skip(self))]
    pub async fn wait_for_instance_start(
        &self,
        instance_id: &InstanceId,
        timeout: Duration,
    ) -> Result<WorkflowInstance, EngineError> {
        self.wait_for(instance_id, timeout, |s| s != WorkflowStatus::Pending)
            .await
    }

    /// Wait until the instance is terminal
    ///
    /// On timeout the instance keeps running; only the caller gives up.
    #[instrument(skip(self))]
    pub async fn wait_for_instance_completion(
        &self,
        instance_id: &InstanceId,
        timeout: Duration,
    ) -> Result<WorkflowInstance, EngineError> {
        self.wait_for(instance_id, timeout, WorkflowStatus::is_terminal)
            .await
    }

    async fn wait_for(
        &self,
        instance_id: &InstanceId,
        timeout: Duration,
        reached: impl Fn(WorkflowStatus) -> bool,
    ) -> Result<WorkflowInstance, EngineError> {
        let mut rx = self.subscribe(instance_id).await?;

        let wait = async {
            loop {
                if reached(*rx.borrow_and_update()) {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender dropped by purge; nothing more will arrive
                    return;
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| EngineError::Timeout {
                instance_id: instance_id.clone(),
                timeout,
            })?;

        self.get_instance_state(instance_id).await
    }

    async fn subscribe(&self, instance_id: &InstanceId) -> Result<watch::Receiver<WorkflowStatus>, EngineError> {
        let sender = self.watcher(instance_id);
        let rx = sender.subscribe();

        // The store is written before the channel, so refreshing after
        // subscribing cannot miss a transition
        let status = match self.inner.store.get_status(instance_id).await {
            Ok(status) => status,
            Err(e) => {
                drop(rx);
                if matches!(e, StoreError::InstanceNotFound(_)) {
                    self.inner
                        .watchers
                        .remove_if(instance_id, |_, sender| sender.receiver_count() == 0);
                }
                return Err(e.into());
            }
        };
        advance(&sender, status);
        Ok(rx)
    }

    fn watcher(&self, instance_id: &InstanceId) -> Arc<watch::Sender<WorkflowStatus>> {
        self.inner
            .watchers
            .entry(instance_id.clone())
            .or_insert_with(|| Arc::new(watch::channel(WorkflowStatus::Pending).0))
            .clone()
    }

    fn publish(&self, instance_id: &InstanceId, status: WorkflowStatus) {
        advance(&self.watcher(instance_id), status);
    }

    // =========================================================================
    // Lifecycle controls
    // =========================================================================

    /// Stop an instance
    ///
    /// Terminal instances are returned unchanged and nothing is appended.
    /// Otherwise `WorkflowTerminated` is recorded, the instance becomes
    /// `Terminated` and no further step is dispatched. A step already running
    /// is signalled through its cancellation flag; its result is discarded.
    #[instrument(skip(self))]
    pub async fn terminate_workflow(
        &self,
        instance_id: &InstanceId,
        reason: &str,
    ) -> Result<WorkflowInstance, EngineError> {
        let lock = self.instance_lock(instance_id);
        {
            let _guard = lock.lock().await;

            let status = self.inner.store.get_status(instance_id).await?;
            if status.is_terminal() {
                debug!(%instance_id, %status, "terminate on terminal instance is a no-op");
            } else {
                let next = self.inner.store.read_history(instance_id).await?.len() as u64;
                self.inner
                    .store
                    .append(
                        instance_id,
                        next,
                        HistoryEvent::WorkflowTerminated {
                            reason: reason.to_string(),
                        },
                    )
                    .await?;
                self.set_status(
                    instance_id,
                    WorkflowStatus::Terminated,
                    None,
                    Some(WorkflowError::new(reason).with_code(TERMINATED_CODE)),
                )
                .await?;

                if let Some(handle) = self.inner.drivers.get(instance_id) {
                    handle.cancel();
                }
                info!(%instance_id, %reason, "terminated workflow instance");
            }
        }

        self.get_instance_state(instance_id).await
    }

    /// Delete a terminal instance and its history
    ///
    /// Returns `false` for unknown ids.
    #[instrument(skip(self))]
    pub async fn purge_instance(&self, instance_id: &InstanceId) -> Result<bool, EngineError> {
        let lock = self.instance_lock(instance_id);
        let _guard = lock.lock().await;

        let status = match self.inner.store.get_status(instance_id).await {
            Ok(status) => status,
            Err(StoreError::InstanceNotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if !status.is_terminal() {
            return Err(EngineError::InstanceNotTerminal(instance_id.clone()));
        }

        let purged = self.inner.store.purge(instance_id).await?;
        self.inner.watchers.remove(instance_id);
        self.inner.locks.remove(instance_id);
        info!(%instance_id, "purged workflow instance");
        Ok(purged)
    }

    /// Pick up instances a previous process left unfinished
    ///
    /// Instances whose history already ends in a terminal event only get
    /// their status re-derived. The rest get a driver that replays and
    /// continues. Returns the number of drivers started.
    #[instrument(skip(self))]
    pub async fn resume_incomplete(&self) -> Result<usize, EngineError> {
        let open = self
            .inner
            .store
            .list_instances(&InstanceFilter::non_terminal())
            .await?;

        let mut resumed = 0;
        for record in open {
            let instance_id = record.instance_id;
            let history = self.inner.store.read_history(&instance_id).await?;
            let outcome = status_from_history(&history);

            if outcome.status.is_terminal() {
                info!(%instance_id, status = %outcome.status, "re-derived status from history");
                self.set_status(&instance_id, outcome.status, outcome.output, outcome.error)
                    .await?;
                continue;
            }

            if !self.inner.workflows.contains(&record.workflow_type) {
                warn!(%instance_id, workflow_type = %record.workflow_type, "skipping instance of unregistered workflow type");
                continue;
            }

            if self.spawn_driver(instance_id) {
                resumed += 1;
            }
        }

        info!(resumed, "resumed incomplete instances");
        Ok(resumed)
    }

    // =========================================================================
    // Driver
    // =========================================================================

    /// Start the driver unless one is already running for this instance
    fn spawn_driver(&self, instance_id: InstanceId) -> bool {
        let handle = match self.inner.drivers.entry(instance_id.clone()) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => slot.insert(CancellationHandle::new()).clone(),
        };

        let engine = self.clone();
        tokio::spawn(async move {
            let _slot = DriverSlot {
                engine: engine.clone(),
                instance_id: instance_id.clone(),
            };

            let outcome = AssertUnwindSafe(engine.drive(&instance_id, &handle))
                .catch_unwind()
                .await;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err),
                Err(panic) => Some(EngineError::DriverPanicked(panic_message(panic.as_ref()))),
            };
            if let Some(err) = failure {
                engine.fail_instance(&instance_id, err).await;
            }
        });
        true
    }

    #[instrument(skip_all, fields(%instance_id))]
    async fn drive(&self, instance_id: &InstanceId, cancel: &CancellationHandle) -> Result<(), EngineError> {
        // The semaphore is never closed while the engine is alive
        let Ok(_permit) = Arc::clone(&self.inner.slots).acquire_owned().await else {
            return Ok(());
        };

        loop {
            let Some((step, next_sequence)) = self.plan_next_step(instance_id).await? else {
                return Ok(());
            };

            info!(
                activity_id = %step.activity_id,
                activity_type = %step.activity_type,
                "dispatching activity"
            );
            let options = self.resolve_options(&step);
            let result = self.run_activity(instance_id, &step, &options, cancel).await;

            let lock = self.instance_lock(instance_id);
            let _guard = lock.lock().await;

            if self.inner.store.get_status(instance_id).await?.is_terminal() {
                debug!(activity_id = %step.activity_id, "discarding result of terminated instance");
                return Ok(());
            }

            let event = match result {
                Ok(output) => HistoryEvent::ActivityCompleted {
                    activity_id: step.activity_id,
                    output,
                },
                Err(error) => {
                    warn!(activity_id = %step.activity_id, error = %error, "activity failed");
                    HistoryEvent::ActivityFailed {
                        activity_id: step.activity_id,
                        error,
                    }
                }
            };
            self.inner.store.append(instance_id, next_sequence, event).await?;
        }
    }

    /// Replay under the instance lock and apply whatever comes next
    ///
    /// Returns the activity to run and the sequence its result goes to, or
    /// `None` once the instance is terminal.
    async fn plan_next_step(&self, instance_id: &InstanceId) -> Result<Option<(PendingStep, u64)>, EngineError> {
        let lock = self.instance_lock(instance_id);
        let _guard = lock.lock().await;

        let record = self.inner.store.get_instance(instance_id).await?;
        if record.status.is_terminal() {
            return Ok(None);
        }
        if record.status == WorkflowStatus::Pending {
            self.set_status(instance_id, WorkflowStatus::Running, None, None)
                .await?;
            info!("workflow instance running");
        }

        let history = self.inner.store.read_history(instance_id).await?;
        let limit = self.inner.config.max_events_per_instance;
        if history.len() >= limit {
            return Err(EngineError::TooManyEvents {
                instance_id: instance_id.clone(),
                count: history.len(),
                limit,
            });
        }

        let next = {
            let ctx = WorkflowContext::new(instance_id.clone());
            let mut workflow = self
                .inner
                .workflows
                .create(&record.workflow_type, &ctx, record.input)?;
            replay(instance_id, workflow.as_mut(), &history)?
        };
        let sequence = history.len() as u64;

        match next {
            NextStep::Dispatch(mut step) => {
                if step.recorded {
                    debug!(activity_id = %step.activity_id, "re-dispatching step without a recorded result");
                    return Ok(Some((step, sequence)));
                }

                let options = self.resolve_options(&step);
                step.options = Some(options.clone());
                let sequence = self
                    .inner
                    .store
                    .append(
                        instance_id,
                        sequence,
                        HistoryEvent::ActivityScheduled {
                            activity_id: step.activity_id.clone(),
                            activity_type: step.activity_type.clone(),
                            input: step.input.clone(),
                            options,
                        },
                    )
                    .await?;
                Ok(Some((step, sequence)))
            }
            NextStep::Complete(result) => {
                self.inner
                    .store
                    .append(instance_id, sequence, HistoryEvent::WorkflowCompleted { result: result.clone() })
                    .await?;
                self.set_status(instance_id, WorkflowStatus::Completed, Some(result), None)
                    .await?;
                info!("workflow instance completed");
                Ok(None)
            }
            NextStep::Fail(error) => {
                self.inner
                    .store
                    .append(instance_id, sequence, HistoryEvent::WorkflowFailed { error: error.clone() })
                    .await?;
                warn!(error = %error, "workflow instance failed");
                self.set_status(instance_id, WorkflowStatus::Failed, None, Some(error))
                    .await?;
                Ok(None)
            }
            NextStep::Finished => {
                let outcome = status_from_history(&history);
                self.set_status(instance_id, outcome.status, outcome.output, outcome.error)
                    .await?;
                Ok(None)
            }
            NextStep::Stalled => {
                let error = WorkflowError::new("workflow stalled").with_code(ENGINE_ERROR_CODE);
                self.inner
                    .store
                    .append(instance_id, sequence, HistoryEvent::WorkflowFailed { error: error.clone() })
                    .await?;
                warn!("workflow stalled with no pending actions");
                self.set_status(instance_id, WorkflowStatus::Failed, None, Some(error))
                    .await?;
                Ok(None)
            }
        }
    }

    /// Options the workflow asked for, else the engine defaults
    fn resolve_options(&self, step: &PendingStep) -> ActivityOptions {
        step.options
            .clone()
            .unwrap_or_else(|| self.inner.config.default_activity_options.clone())
    }

    /// Run one step, retrying as its options allow
    ///
    /// Stops without another attempt once the instance is cancelled.
    async fn run_activity(
        &self,
        instance_id: &InstanceId,
        step: &PendingStep,
        options: &ActivityOptions,
        cancel: &CancellationHandle,
    ) -> ActivityResult {
        let policy = &options.retry_policy;
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(ActivityError::non_retryable(format!(
                    "{} cancelled before attempt {attempt}",
                    step.activity_id
                )));
            }

            let ctx = ActivityContext::new(instance_id.clone(), &step.activity_id, &step.activity_type)
                .with_attempt(attempt, policy.max_attempts)
                .with_cancellation(cancel);
            let call = self.invoke_attempt(&step.activity_type, ctx, step.input.clone());

            let result = match options.start_to_close_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| Err(ActivityError::timed_out(&step.activity_type, limit))),
                None => call.await,
            };

            match result {
                Err(error) if !cancel.is_cancelled() && policy.should_retry(&error, attempt) => {
                    attempt += 1;
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        activity_id = %step.activity_id,
                        attempt,
                        ?delay,
                        error = %error,
                        "retrying activity"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(error),
                    }
                }
                other => return other,
            }
        }
    }

    /// Invoke a handler once; a panic becomes a non-retryable failure
    async fn invoke_attempt(&self, activity_type: &str, ctx: ActivityContext, input: Value) -> ActivityResult {
        let call = self.inner.activities.invoke(activity_type, ctx, input);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(%activity_type, %message, "activity panicked");
                Err(ActivityError::non_retryable(format!("activity panicked: {message}"))
                    .with_type(error_types::ACTIVITY_EXECUTION))
            }
        }
    }

    /// Record a driver fault as a failed instance
    async fn fail_instance(&self, instance_id: &InstanceId, err: EngineError) {
        error!(%instance_id, error = %err, "workflow driver failed");

        let lock = self.instance_lock(instance_id);
        let _guard = lock.lock().await;

        let result: Result<(), EngineError> = async {
            if self.inner.store.get_status(instance_id).await?.is_terminal() {
                return Ok(());
            }
            let error = WorkflowError::new(err.to_string()).with_code(ENGINE_ERROR_CODE);
            let next = self.inner.store.read_history(instance_id).await?.len() as u64;
            self.inner
                .store
                .append(instance_id, next, HistoryEvent::WorkflowFailed { error: error.clone() })
                .await?;
            self.set_status(instance_id, WorkflowStatus::Failed, None, Some(error))
                .await
        }
        .await;

        if let Err(e) = result {
            error!(%instance_id, error = %e, "could not record driver failure");
        }
    }

    async fn set_status(
        &self,
        instance_id: &InstanceId,
        status: WorkflowStatus,
        output: Option<Value>,
        error: Option<WorkflowError>,
    ) -> Result<(), EngineError> {
        self.inner
            .store
            .set_status(instance_id, status, output, error)
            .await?;
        self.publish(instance_id, status);
        Ok(())
    }

    fn instance_lock(&self, instance_id: &InstanceId) -> Arc<Mutex<()>> {
        self.inner
            .locks
            .entry(instance_id.clone())
            .or_default()
            .clone()
    }
}

/// Removes the driver entry when its task ends, panics included
struct DriverSlot<S: InstanceStore> {
    engine: WorkflowEngine<S>,
    instance_id: InstanceId,
}

impl<S: InstanceStore> Drop for DriverSlot<S> {
    fn drop(&mut self) {
        self.engine.inner.drivers.remove(&self.instance_id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Move a status channel forward, never back
///
/// A waiter refreshing from a stale read must not undo a newer transition.
fn advance(sender: &watch::Sender<WorkflowStatus>, status: WorkflowStatus) {
    sender.send_if_modified(|current| {
        if rank(status) > rank(*current) {
            *current = status;
            true
        } else {
            false
        }
    });
}

fn rank(status: WorkflowStatus) -> u8 {
    match status {
        WorkflowStatus::Pending => 0,
        WorkflowStatus::Running => 1,
        WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Terminated => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryInstanceStore;
    use crate::workflow::WorkflowAction;
    use serde_json::json;

    struct PanicsOnStart;

    impl Workflow for PanicsOnStart {
        const TYPE: &'static str = "PanicsOnStart";
        type Input = Value;
        type Output = Value;

        fn new(_ctx: &WorkflowContext, _input: Value) -> Self {
            Self
        }

        fn on_start(&mut self) -> Vec<WorkflowAction> {
            panic!("bad workflow code")
        }

        fn on_activity_completed(&mut self, _activity_id: &str, _output: Value) -> Vec<WorkflowAction> {
            vec![]
        }

        fn on_activity_failed(&mut self, _activity_id: &str, _error: &ActivityError) -> Vec<WorkflowAction> {
            vec![]
        }
    }

    fn engine() -> WorkflowEngine<InMemoryInstanceStore> {
        WorkflowEngine::new(InMemoryInstanceStore::new(), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_driver_panic_fails_instance_and_clears_driver() {
        let engine = engine();
        engine.register_workflow::<PanicsOnStart>().unwrap();

        let id = engine
            .schedule_new_workflow::<PanicsOnStart>(json!({}))
            .await
            .unwrap();
        let state = engine
            .wait_for_instance_completion(&id, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(state.status, WorkflowStatus::Failed);
        let error = state.error.unwrap();
        assert_eq!(error.code.as_deref(), Some(ENGINE_ERROR_CODE));
        assert!(error.message.contains("bad workflow code"));

        for _ in 0..100 {
            if engine.inner.drivers.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(engine.inner.drivers.is_empty());
    }

    #[tokio::test]
    async fn test_waiting_on_unknown_instance_leaves_no_watcher() {
        let engine = engine();

        for i in 0..3 {
            let id = InstanceId::from(format!("missing-{i}"));
            let result = engine
                .wait_for_instance_completion(&id, Duration::from_millis(10))
                .await;
            assert!(matches!(result, Err(EngineError::InstanceNotFound(_))));
        }

        assert!(engine.inner.watchers.is_empty());
    }

    #[test]
    fn test_status_channel_only_moves_forward() {
        let (tx, rx) = watch::channel(WorkflowStatus::Pending);

        advance(&tx, WorkflowStatus::Completed);
        advance(&tx, WorkflowStatus::Running);
        advance(&tx, WorkflowStatus::Failed);

        assert_eq!(*rx.borrow(), WorkflowStatus::Completed);
    }
}

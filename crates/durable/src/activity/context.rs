//! Activity execution context

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::persistence::InstanceId;

/// Context provided to activities during execution
///
/// The context provides:
/// - The owning instance and the step being executed
/// - Information about the current execution attempt
/// - Cooperative cancellation (set when the instance is terminated)
///
/// # Example
///
/// ```ignore
/// async fn execute(&self, ctx: &ActivityContext, input: Input) -> Result<Output, ActivityError> {
///     tokio::select! {
///         result = do_work(input) => Ok(result?),
///         _ = ctx.cancelled() => Err(ActivityError::non_retryable("cancelled")),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ActivityContext {
    /// Instance that owns this activity
    pub instance_id: InstanceId,

    /// Activity ID within the workflow
    pub activity_id: String,

    /// Registered activity name
    pub activity_type: String,

    /// Current attempt number (1-based)
    pub attempt: u32,

    /// Maximum attempts allowed
    pub max_attempts: u32,

    cancelled: Arc<AtomicBool>,
}

impl ActivityContext {
    /// Create a new activity context
    pub fn new(
        instance_id: InstanceId,
        activity_id: impl Into<String>,
        activity_type: impl Into<String>,
    ) -> Self {
        Self {
            instance_id,
            activity_id: activity_id.into(),
            activity_type: activity_type.into(),
            attempt: 1,
            max_attempts: 1,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set attempt bookkeeping
    pub fn with_attempt(mut self, attempt: u32, max_attempts: u32) -> Self {
        self.attempt = attempt;
        self.max_attempts = max_attempts;
        self
    }

    /// Share a cancellation flag with the engine
    pub(crate) fn with_cancellation(mut self, handle: &CancellationHandle) -> Self {
        self.cancelled = handle.cancelled.clone();
        self
    }

    /// Get a handle that can be used to cancel this activity
    pub fn cancellation_handle(&self) -> CancellationHandle {
        CancellationHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Get a future that resolves when cancellation is requested
    ///
    /// This is useful for select! patterns. The engine never aborts a running
    /// activity; observing this is up to the handler.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Check if this is the last retry attempt
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Handle to cancel an activity
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Create a fresh, uncancelled handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the activity
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancel() was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Resolves once cancel() has been called
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ActivityContext {
        ActivityContext::new(InstanceId::from("order-1"), "step-1", "Notify")
    }

    #[test]
    fn test_activity_context_creation() {
        let ctx = ctx().with_attempt(1, 3);

        assert_eq!(ctx.instance_id.as_str(), "order-1");
        assert_eq!(ctx.activity_id, "step-1");
        assert_eq!(ctx.activity_type, "Notify");
        assert!(!ctx.is_cancelled());
        assert!(!ctx.is_last_attempt());
    }

    #[test]
    fn test_is_last_attempt() {
        assert!(ctx().with_attempt(3, 3).is_last_attempt());
        assert!(!ctx().with_attempt(2, 3).is_last_attempt());
    }

    #[test]
    fn test_cancellation() {
        let ctx = ctx();
        let handle = ctx.cancellation_handle();

        assert!(!ctx.is_cancelled());
        handle.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_shared_engine_handle() {
        let handle = CancellationHandle::new();
        let ctx = ctx().with_cancellation(&handle);

        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), ctx.cancelled())
            .await
            .expect("cancelled() should resolve");
    }

    #[tokio::test]
    async fn test_handle_cancelled_resolves() {
        let handle = CancellationHandle::new();
        let waiter = handle.clone();

        let wait = tokio::spawn(async move { waiter.cancelled().await });
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), wait)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }
}

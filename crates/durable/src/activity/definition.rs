//! Activity trait definition

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::ActivityContext;

/// Well-known values for [`ActivityError::error_type`]
pub mod error_types {
    /// The workflow referenced an activity name nobody registered
    pub const ACTIVITY_NOT_FOUND: &str = "ACTIVITY_NOT_FOUND";

    /// The handler ran and returned an error
    pub const ACTIVITY_EXECUTION: &str = "ACTIVITY_EXECUTION";

    /// Input or output could not be converted to/from JSON
    pub const SERIALIZATION: &str = "SERIALIZATION";

    /// The handler exceeded its start-to-close timeout
    pub const TIMEOUT: &str = "TIMEOUT";
}

/// Error type for activity failures
///
/// This is data, not a Rust error hierarchy: it is persisted verbatim in the
/// `ActivityFailed` history event and handed back to the workflow on replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityError {
    /// Error message
    pub message: String,

    /// Error type/code for programmatic handling (see [`error_types`])
    pub error_type: Option<String>,

    /// Whether this error is retryable
    ///
    /// Non-retryable errors fail the step immediately even when the
    /// activity options allow more attempts.
    pub retryable: bool,

    /// Additional error details (for debugging)
    pub details: Option<serde_json::Value>,
}

impl ActivityError {
    /// Create a new retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: true,
            details: None,
        }
    }

    /// Create a non-retryable error
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: false,
            details: None,
        }
    }

    /// The named activity is not registered
    pub fn not_found(activity_type: &str) -> Self {
        Self::non_retryable(format!("activity not registered: {activity_type}"))
            .with_type(error_types::ACTIVITY_NOT_FOUND)
    }

    /// Input or output could not be (de)serialized
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::non_retryable(message).with_type(error_types::SERIALIZATION)
    }

    /// The activity ran past its deadline
    pub fn timed_out(activity_type: &str, limit: std::time::Duration) -> Self {
        Self::retryable(format!("activity {activity_type} timed out after {limit:?}"))
            .with_type(error_types::TIMEOUT)
    }

    /// Set the error type
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Add error details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Whether this failure means the activity was never registered
    pub fn is_not_found(&self) -> bool {
        self.error_type.as_deref() == Some(error_types::ACTIVITY_NOT_FOUND)
    }
}

impl std::fmt::Display for ActivityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActivityError {}

impl From<anyhow::Error> for ActivityError {
    fn from(err: anyhow::Error) -> Self {
        Self::non_retryable(err.to_string()).with_type(error_types::ACTIVITY_EXECUTION)
    }
}

/// An activity is a unit of (possibly side-effecting) work invoked by a workflow step
///
/// Activities sit on the durability boundary. They may perform I/O, read the
/// clock or use randomness freely; only the value they return is recorded in
/// the instance history and fed back into the deterministic workflow.
///
/// # Example
///
/// ```ignore
/// use orderflow_durable::prelude::*;
///
/// struct SendEmailActivity;
///
/// #[async_trait]
/// impl Activity for SendEmailActivity {
///     const TYPE: &'static str = "SendEmail";
///     type Input = SendEmailInput;
///     type Output = SendEmailOutput;
///
///     async fn execute(
///         &self,
///         ctx: &ActivityContext,
///         input: Self::Input,
///     ) -> Result<Self::Output, ActivityError> {
///         // Send email...
///         Ok(SendEmailOutput { message_id: "..." })
///     }
/// }
/// ```
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    /// Unique name of this activity
    ///
    /// Workflows schedule activities by this name.
    const TYPE: &'static str;

    /// Input type for the activity
    type Input: Serialize + DeserializeOwned + Send;

    /// Output type for the activity
    type Output: Serialize + DeserializeOwned + Send;

    /// Execute the activity
    ///
    /// # Errors
    ///
    /// Return an [`ActivityError`] when the operation could not run. A
    /// business-level "no" (insufficient stock, declined payment) belongs in
    /// `Output`, not here.
    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_error_retryable() {
        let error = ActivityError::retryable("timeout");
        assert!(error.retryable);
        assert_eq!(error.to_string(), "timeout");
    }

    #[test]
    fn test_activity_error_non_retryable() {
        let error = ActivityError::non_retryable("invalid input");
        assert!(!error.retryable);
    }

    #[test]
    fn test_not_found_error() {
        let error = ActivityError::not_found("Missing");

        assert!(error.is_not_found());
        assert!(!error.retryable);
        assert!(error.message.contains("Missing"));
    }

    #[test]
    fn test_anyhow_conversion_is_execution_error() {
        let error: ActivityError = anyhow::anyhow!("boom").into();

        assert_eq!(error.error_type.as_deref(), Some(error_types::ACTIVITY_EXECUTION));
        assert_eq!(error.message, "boom");
    }

    #[test]
    fn test_activity_error_serialization() {
        let error = ActivityError::retryable("test error")
            .with_type("TEST")
            .with_details(serde_json::json!({"key": "value"}));

        let json = serde_json::to_string(&error).unwrap();
        let parsed: ActivityError = serde_json::from_str(&json).unwrap();

        assert_eq!(error, parsed);
    }
}

//! Activity registry: name → type-erased handler

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::{error_types, Activity, ActivityContext, ActivityError};
use crate::engine::RegistryError;

/// Activity execution result (JSON in, JSON out)
pub type ActivityResult = Result<Value, ActivityError>;

/// Activity handler function type
pub type ActivityHandler = Arc<
    dyn Fn(ActivityContext, Value) -> Pin<Box<dyn Future<Output = ActivityResult> + Send>>
        + Send
        + Sync,
>;

/// Registry of activity handlers keyed by name
///
/// Registration takes `&self` so hosts can keep adding handlers after the
/// engine has been shared.
#[derive(Default)]
pub struct ActivityRegistry {
    handlers: RwLock<HashMap<String, ActivityHandler>>,
}

impl ActivityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed activity under `A::TYPE`
    pub fn register<A: Activity>(&self, activity: A) -> Result<(), RegistryError> {
        let activity = Arc::new(activity);
        let handler: ActivityHandler = Arc::new(move |ctx, input| {
            let activity = Arc::clone(&activity);
            Box::pin(async move {
                let typed: A::Input = serde_json::from_value(input).map_err(|e| {
                    ActivityError::serialization(format!("invalid input for {}: {e}", A::TYPE))
                })?;
                let output = activity.execute(&ctx, typed).await?;
                serde_json::to_value(output).map_err(|e| {
                    ActivityError::serialization(format!("invalid output from {}: {e}", A::TYPE))
                })
            })
        });

        self.insert(A::TYPE, handler)
    }

    /// Register a JSON handler under an explicit name
    pub fn register_fn<F, Fut>(&self, activity_type: &str, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(ActivityContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActivityResult> + Send + 'static,
    {
        let handler: ActivityHandler = Arc::new(move |ctx, input| Box::pin(handler(ctx, input)));
        self.insert(activity_type, handler)
    }

    fn insert(&self, activity_type: &str, handler: ActivityHandler) -> Result<(), RegistryError> {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(activity_type) {
            return Err(RegistryError::DuplicateActivity(activity_type.to_string()));
        }
        handlers.insert(activity_type.to_string(), handler);
        debug!(%activity_type, "registered activity");
        Ok(())
    }

    /// Run the named activity
    ///
    /// Unregistered names fail with `ACTIVITY_NOT_FOUND`; handler errors
    /// without a type are tagged `ACTIVITY_EXECUTION`.
    pub async fn invoke(&self, activity_type: &str, ctx: ActivityContext, input: Value) -> ActivityResult {
        let handler = self.handlers.read().get(activity_type).cloned();
        let Some(handler) = handler else {
            return Err(ActivityError::not_found(activity_type));
        };

        handler(ctx, input).await.map_err(|mut err| {
            if err.error_type.is_none() {
                err.error_type = Some(error_types::ACTIVITY_EXECUTION.to_string());
            }
            err
        })
    }

    /// Check if an activity is registered
    pub fn contains(&self, activity_type: &str) -> bool {
        self.handlers.read().contains_key(activity_type)
    }

    /// Number of registered activities
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// All registered activity names, sorted
    pub fn activity_types(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("activity_types", &self.activity_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InstanceId;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct AddInput {
        a: i64,
        b: i64,
    }

    struct AddActivity;

    #[async_trait]
    impl Activity for AddActivity {
        const TYPE: &'static str = "Add";
        type Input = AddInput;
        type Output = i64;

        async fn execute(&self, _ctx: &ActivityContext, input: AddInput) -> Result<i64, ActivityError> {
            Ok(input.a + input.b)
        }
    }

    fn ctx(activity_type: &str) -> ActivityContext {
        ActivityContext::new(InstanceId::from("wf-1"), "step-1", activity_type)
    }

    #[tokio::test]
    async fn test_register_and_invoke() {
        let registry = ActivityRegistry::new();
        registry.register(AddActivity).unwrap();

        let output = registry
            .invoke("Add", ctx("Add"), json!({"a": 2, "b": 3}))
            .await
            .unwrap();

        assert_eq!(output, json!(5));
    }

    #[tokio::test]
    async fn test_unknown_activity() {
        let registry = ActivityRegistry::new();

        let err = registry.invoke("Nope", ctx("Nope"), json!({})).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_bad_input_is_serialization_error() {
        let registry = ActivityRegistry::new();
        registry.register(AddActivity).unwrap();

        let err = registry
            .invoke("Add", ctx("Add"), json!({"a": "two"}))
            .await
            .unwrap_err();

        assert_eq!(err.error_type.as_deref(), Some(error_types::SERIALIZATION));
    }

    #[tokio::test]
    async fn test_handler_error_gets_execution_type() {
        let registry = ActivityRegistry::new();
        registry
            .register_fn("Explode", |_ctx, _input| async {
                Err(ActivityError::non_retryable("kaboom"))
            })
            .unwrap();

        let err = registry.invoke("Explode", ctx("Explode"), json!(null)).await.unwrap_err();
        assert_eq!(err.error_type.as_deref(), Some(error_types::ACTIVITY_EXECUTION));
        assert_eq!(err.message, "kaboom");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = ActivityRegistry::new();
        registry.register(AddActivity).unwrap();

        let result = registry.register(AddActivity);
        assert!(matches!(result, Err(RegistryError::DuplicateActivity(name)) if name == "Add"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_activity_types_sorted() {
        let registry = ActivityRegistry::new();
        registry.register_fn("b", |_, v| async move { Ok(v) }).unwrap();
        registry.register_fn("a", |_, v| async move { Ok(v) }).unwrap();

        assert_eq!(registry.activity_types(), vec!["a", "b"]);
        assert!(format!("{registry:?}").contains("\"a\""));
    }
}

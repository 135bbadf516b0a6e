//! Engine configuration

use crate::workflow::ActivityOptions;

/// Configuration for the workflow engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Instances driven at the same time; further drivers wait for a slot
    pub max_concurrent_instances: usize,

    /// History length at which an instance is failed
    pub max_events_per_instance: usize,

    /// Options applied to steps scheduled with `ActivityOptions::default()`
    pub default_activity_options: ActivityOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_instances: 100,
            max_events_per_instance: 10_000,
            default_activity_options: ActivityOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables
    ///
    /// - `ORDERFLOW_MAX_CONCURRENT_INSTANCES`
    /// - `ORDERFLOW_MAX_EVENTS_PER_INSTANCE`
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_concurrent_instances = std::env::var("ORDERFLOW_MAX_CONCURRENT_INSTANCES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_concurrent_instances);

        let max_events_per_instance = std::env::var("ORDERFLOW_MAX_EVENTS_PER_INSTANCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_events_per_instance);

        Self {
            max_concurrent_instances,
            max_events_per_instance,
            ..defaults
        }
    }

    pub fn with_max_concurrent_instances(mut self, max: usize) -> Self {
        self.max_concurrent_instances = max.max(1);
        self
    }

    pub fn with_max_events_per_instance(mut self, max: usize) -> Self {
        self.max_events_per_instance = max;
        self
    }

    pub fn with_default_activity_options(mut self, options: ActivityOptions) -> Self {
        self.default_activity_options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reliability::RetryPolicy;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_instances, 100);
        assert_eq!(config.max_events_per_instance, 10_000);
        assert_eq!(config.default_activity_options.retry_policy.max_attempts, 1);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_max_concurrent_instances(0)
            .with_max_events_per_instance(50)
            .with_default_activity_options(
                ActivityOptions::default().with_retry(RetryPolicy::fixed(Duration::ZERO, 2)),
            );

        assert_eq!(config.max_concurrent_instances, 1);
        assert_eq!(config.max_events_per_instance, 50);
        assert_eq!(config.default_activity_options.retry_policy.max_attempts, 2);
    }
}

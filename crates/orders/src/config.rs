// Order services configuration

use std::time::Duration;

/// Tunables for the simulated order services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderServicesConfig {
    /// Time the simulated payment gateway takes per charge
    pub payment_delay: Duration,

    /// Time the inventory update takes before touching stock
    pub inventory_update_delay: Duration,

    /// Whether the simulated gateway approves payments
    pub approve_payments: bool,
}

impl Default for OrderServicesConfig {
    fn default() -> Self {
        Self {
            payment_delay: Duration::from_secs(2),
            inventory_update_delay: Duration::from_secs(5),
            approve_payments: true,
        }
    }
}

impl OrderServicesConfig {
    /// Create config from environment variables
    ///
    /// - `ORDERFLOW_PAYMENT_DELAY_MS`
    /// - `ORDERFLOW_INVENTORY_UPDATE_DELAY_MS`
    /// - `ORDERFLOW_APPROVE_PAYMENTS` (`true`/`false`)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let payment_delay = env_millis("ORDERFLOW_PAYMENT_DELAY_MS").unwrap_or(defaults.payment_delay);
        let inventory_update_delay = env_millis("ORDERFLOW_INVENTORY_UPDATE_DELAY_MS")
            .unwrap_or(defaults.inventory_update_delay);
        let approve_payments = std::env::var("ORDERFLOW_APPROVE_PAYMENTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.approve_payments);

        Self {
            payment_delay,
            inventory_update_delay,
            approve_payments,
        }
    }

    /// No simulated delays; for tests and quick demos
    pub fn instant() -> Self {
        Self {
            payment_delay: Duration::ZERO,
            inventory_update_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_payment_delay(mut self, delay: Duration) -> Self {
        self.payment_delay = delay;
        self
    }

    pub fn with_inventory_update_delay(mut self, delay: Duration) -> Self {
        self.inventory_update_delay = delay;
        self
    }

    pub fn with_approve_payments(mut self, approve: bool) -> Self {
        self.approve_payments = approve;
        self
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
}

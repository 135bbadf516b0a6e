// Payment processing
//
// The payment activity delegates to a PaymentProcessor so hosts and tests can
// swap the gateway. SimulatedPaymentProcessor stands in for a real one.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::PaymentRequest;

/// Charges a customer for an order
///
/// `Ok(false)` is a declined payment. `Err` means the charge could not be
/// attempted at all.
#[async_trait]
pub trait PaymentProcessor: Send + Sync + 'static {
    async fn process(&self, request: &PaymentRequest) -> Result<bool>;
}

/// Waits a fixed delay, then approves or declines every payment
#[derive(Debug, Clone)]
pub struct SimulatedPaymentProcessor {
    delay: Duration,
    approve: bool,
}

impl SimulatedPaymentProcessor {
    pub fn new(delay: Duration, approve: bool) -> Self {
        Self { delay, approve }
    }

    /// Approves immediately
    pub fn approving() -> Self {
        Self::new(Duration::ZERO, true)
    }

    /// Declines immediately
    pub fn declining() -> Self {
        Self::new(Duration::ZERO, false)
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedPaymentProcessor {
    async fn process(&self, request: &PaymentRequest) -> Result<bool> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.approve {
            tracing::info!(request_id = %request.request_id, "payment processed");
        } else {
            tracing::info!(request_id = %request.request_id, "payment declined");
        }
        Ok(self.approve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            request_id: "order-1".into(),
            item_name: "Car".into(),
            quantity: 1,
        }
    }

    #[tokio::test]
    async fn test_simulated_processor_decision() {
        assert!(SimulatedPaymentProcessor::approving()
            .process(&request())
            .await
            .unwrap());
        assert!(!SimulatedPaymentProcessor::declining()
            .process(&request())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_simulated_processor_waits() {
        let processor = SimulatedPaymentProcessor::new(Duration::from_millis(20), true);
        let started = tokio::time::Instant::now();

        processor.process(&request()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}

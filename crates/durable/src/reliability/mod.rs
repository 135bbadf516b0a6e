//! Reliability patterns for activity execution
//!
//! - [`RetryPolicy`] - opt-in retry with exponential backoff and jitter

mod retry;

pub use retry::RetryPolicy;

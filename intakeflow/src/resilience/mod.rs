//! Resilience primitives for calls to unreliable dependencies.
//!
//! A [`CircuitBreaker`] decides whether a dependency should be called at all;
//! a [`RetryingCall`] consults it before every attempt, reports each outcome
//! back, and retries retriable failures with exponential backoff.

mod breaker;
mod retry;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use retry::{Classify, ErrorClass, JitterStrategy, RetryAttempt, RetryPolicy, RetryingCall};

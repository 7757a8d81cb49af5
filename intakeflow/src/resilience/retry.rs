//! Bounded retries with exponential backoff behind a circuit breaker.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CircuitBreaker, CircuitState};
use crate::errors::CallError;

/// Randomization applied to each backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Exact exponential delays.
    #[default]
    None,
    /// Uniform between zero and the delay.
    Full,
    /// Half the delay fixed, the other half random.
    Equal,
}

/// Retry limits and backoff schedule.
///
/// The wait after failed attempt `n` is `min(base * multiplier^(n-1), max)`,
/// then jittered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Wait after the first failure, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Growth factor per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound on any single wait, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// The wait after failed attempt `attempt` (1-based).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => {
                if capped > 0.0 {
                    rand::thread_rng().gen_range(0.0..=capped)
                } else {
                    0.0
                }
            }
            JitterStrategy::Equal => {
                let half = capped / 2.0;
                if half > 0.0 {
                    half + rand::thread_rng().gen_range(0.0..=half)
                } else {
                    capped
                }
            }
        };

        Duration::from_secs_f64(jittered / 1000.0)
    }
}

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Transient; another attempt may succeed.
    Retriable,
    /// Permanent; do not try again.
    Terminal,
}

/// Errors that know their own retry classification.
pub trait Classify {
    /// Classifies this error.
    fn classify(&self) -> ErrorClass;
}

/// One failed attempt, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// How the failure was classified.
    pub classification: ErrorClass,
    /// The wait before the next attempt, or `None` if this was the last.
    pub wait: Option<Duration>,
}

/// One attempt the breaker let through.
///
/// Reports a failure on drop unless an outcome was recorded, so a panicking
/// or cancelled attempt cannot leave a half-open probe outstanding.
struct AttemptGuard<'a> {
    breaker: &'a CircuitBreaker,
    reported: bool,
}

impl<'a> AttemptGuard<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            reported: false,
        }
    }

    fn succeeded(mut self) {
        self.reported = true;
        self.breaker.record_success();
    }

    fn failed(mut self) {
        self.reported = true;
        self.breaker.record_failure();
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.reported {
            warn!(
                dependency = %self.breaker.name(),
                "Attempt abandoned before reporting, counting it as a failure"
            );
            self.breaker.record_failure();
        }
    }
}

/// Wraps calls to one dependency with a breaker and a retry policy.
#[derive(Debug, Clone)]
pub struct RetryingCall {
    policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl RetryingCall {
    /// Creates a retrying call guarded by `breaker`.
    pub fn new(policy: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        Self { policy, breaker }
    }

    /// The retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The breaker consulted before every attempt.
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Calls `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// # Errors
    ///
    /// [`CallError::CircuitOpen`] if the breaker refuses an attempt, otherwise
    /// [`CallError::Failed`] with the error of the last attempt.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::fmt::Display,
    {
        self.call_with(op, E::classify).await
    }

    /// Like [`call`](Self::call), with an explicit classifier.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn call_with<F, Fut, T, E, C>(&self, op: F, classify: C) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        C: Fn(&E) -> ErrorClass,
    {
        let mut attempts = Vec::new();
        self.run(op, classify, &mut attempts).await
    }

    /// Like [`call`](Self::call), also returning the log of failed attempts.
    pub async fn call_recorded<F, Fut, T, E>(
        &self,
        op: F,
    ) -> (Result<T, CallError<E>>, Vec<RetryAttempt>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::fmt::Display,
    {
        let mut attempts = Vec::new();
        let result = self.run(op, E::classify, &mut attempts).await;
        (result, attempts)
    }

    async fn run<F, Fut, T, E, C>(
        &self,
        mut op: F,
        classify: C,
        log: &mut Vec<RetryAttempt>,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        C: Fn(&E) -> ErrorClass,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if !self.breaker.allow_request() {
                debug!(
                    dependency = %self.breaker.name(),
                    attempt,
                    "Skipping call, circuit breaker is open"
                );
                return Err(CallError::CircuitOpen {
                    dependency: self.breaker.name().to_string(),
                });
            }

            let guard = AttemptGuard::new(&self.breaker);
            let err = match op().await {
                Ok(value) => {
                    guard.succeeded();
                    return Ok(value);
                }
                Err(err) => err,
            };
            guard.failed();

            let classification = classify(&err);
            if classification == ErrorClass::Terminal || attempt >= max_attempts {
                log.push(RetryAttempt {
                    attempt,
                    classification,
                    wait: None,
                });
                warn!(
                    dependency = %self.breaker.name(),
                    attempt,
                    ?classification,
                    error = %err,
                    "Call failed, giving up"
                );
                return Err(CallError::Failed(err));
            }

            if self.breaker.state() == CircuitState::Open {
                log.push(RetryAttempt {
                    attempt,
                    classification,
                    wait: None,
                });
                debug!(
                    dependency = %self.breaker.name(),
                    attempt,
                    error = %err,
                    "Circuit breaker opened, abandoning retries"
                );
                return Err(CallError::CircuitOpen {
                    dependency: self.breaker.name().to_string(),
                });
            }

            let wait = self.policy.delay_for(attempt);
            log.push(RetryAttempt {
                attempt,
                classification,
                wait: Some(wait),
            });
            debug!(
                dependency = %self.breaker.name(),
                attempt,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Retriable failure, backing off"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RiskApiError;
    use crate::resilience::BreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn retrying(policy: RetryPolicy, threshold: u32) -> RetryingCall {
        let breaker = CircuitBreaker::new(
            "risk-api",
            BreakerConfig::default().with_failure_threshold(threshold),
        );
        RetryingCall::new(policy, Arc::new(breaker))
    }

    #[test]
    fn test_delay_schedule_is_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6)
            .map(|a| u64::try_from(policy.delay_for(a).as_millis()).unwrap())
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000, 10_000]);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let full = RetryPolicy::default().with_jitter(JitterStrategy::Full);
        let equal = RetryPolicy::default().with_jitter(JitterStrategy::Equal);
        for _ in 0..100 {
            assert!(full.delay_for(2) <= Duration::from_secs(2));
            let d = equal.delay_for(2);
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_aborts_without_waiting() {
        let call = retrying(RetryPolicy::default(), 5);
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let (result, log) = call
            .call_recorded(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(RiskApiError::ClientPermanent {
                        status: Some(404),
                        message: "unknown company".to_string(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(
            result,
            Err(CallError::Failed(RiskApiError::ClientPermanent { status: Some(404), .. }))
        ));
        assert_eq!(
            log,
            vec![RetryAttempt {
                attempt: 1,
                classification: ErrorClass::Terminal,
                wait: None,
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retriable_error_exhausts_with_original_error() {
        let call = retrying(RetryPolicy::default(), 5);
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let (result, log) = call
            .call_recorded(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Err::<(), _>(RiskApiError::ServerTransient {
                        status: Some(503),
                        message: format!("unavailable on attempt {n}"),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3_100));
        assert_eq!(
            result.unwrap_err(),
            CallError::Failed(RiskApiError::ServerTransient {
                status: Some(503),
                message: "unavailable on attempt 3".to_string(),
            })
        );
        let waits: Vec<_> = log.iter().map(|a| a.wait).collect();
        assert_eq!(
            waits,
            vec![Some(Duration::from_secs(1)), Some(Duration::from_secs(2)), None]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_second_attempt() {
        let call = retrying(RetryPolicy::default(), 5);
        let calls = AtomicU32::new(0);

        let result = call
            .call(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        Err(RiskApiError::Timeout {
                            message: "read timed out".to_string(),
                        })
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(call.breaker().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_skips_call() {
        let call = retrying(RetryPolicy::default(), 1);
        call.breaker().record_failure();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = call
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, RiskApiError>(()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(result.unwrap_err().is_circuit_open());
    }

    fn recovering(recovery_ms: u64) -> RetryingCall {
        let breaker = CircuitBreaker::new(
            "risk-api",
            BreakerConfig::default()
                .with_failure_threshold(1)
                .with_recovery_timeout(Duration::from_millis(recovery_ms)),
        );
        RetryingCall::new(RetryPolicy::default(), Arc::new(breaker))
    }

    async fn exploding() -> Result<(), RiskApiError> {
        panic!("risk client bug")
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opening_mid_retry_stops_attempts() {
        let call = retrying(RetryPolicy::default().with_max_attempts(5), 2);
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let (result, log) = call
            .call_recorded(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(RiskApiError::Timeout {
                        message: "connect timeout".to_string(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(call.breaker().state(), CircuitState::Open);
        assert_eq!(
            result.unwrap_err(),
            CallError::CircuitOpen {
                dependency: "risk-api".to_string()
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(log.last().map(|a| a.wait), Some(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_probe_reopens_breaker() {
        let call = recovering(100);
        call.breaker().record_failure();
        tokio::time::advance(Duration::from_millis(100)).await;

        let probe = call.clone();
        let joined = tokio::spawn(async move { probe.call(exploding).await }).await;
        assert!(joined.unwrap_err().is_panic());
        assert_eq!(call.breaker().state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(100)).await;
        let result = call.call(|| async { Ok::<_, RiskApiError>(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(call.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_reopens_breaker() {
        let call = recovering(100);
        call.breaker().record_failure();
        tokio::time::advance(Duration::from_millis(100)).await;

        let slow = call.call(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, RiskApiError>(())
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), slow).await;
        assert!(timed_out.is_err());
        assert_eq!(call.breaker().state(), CircuitState::Open);

        assert!(!call.breaker().allow_request());
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(call.breaker().allow_request());
        assert_eq!(call.breaker().state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_classifier() {
        let call = retrying(RetryPolicy::default(), 5);
        let calls = AtomicU32::new(0);

        let result = call
            .call_with(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("quota exceeded".to_string()) }
                },
                |_| ErrorClass::Terminal,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().into_inner().as_deref(), Some("quota exceeded"));
    }
}

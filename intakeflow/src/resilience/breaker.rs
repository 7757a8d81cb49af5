//! Three-state circuit breaker.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::{types, EventSink, NoOpEventSink};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    #[default]
    Closed,
    /// Calls are refused until the recovery timeout elapses.
    Open,
    /// One probe call is testing whether the dependency recovered.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Time spent open before a probe is allowed, in milliseconds.
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_ms() -> u64 {
    30_000
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
        }
    }
}

impl BreakerConfig {
    /// Sets the failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the recovery timeout.
    #[must_use]
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Gets the recovery timeout as a Duration.
    #[must_use]
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_transition: Instant,
    probe_in_flight: bool,
}

impl BreakerState {
    fn transition(&mut self, to: CircuitState) {
        self.state = to;
        self.last_transition = Instant::now();
    }
}

/// Circuit breaker for one named dependency.
///
/// Callers report exactly one outcome per attempt they were allowed to make.
/// The internal lock only covers the state transition; it is never held
/// while a call or an event sink runs.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
    events: Arc<dyn EventSink>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_transition: Instant::now(),
                probe_in_flight: false,
            }),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the sink that receives `breaker.*` transition events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The dependency this breaker protects.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured thresholds.
    #[must_use]
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state. Does not advance OPEN to HALF_OPEN.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Current consecutive failure count.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Decides whether a call may be attempted now.
    ///
    /// Once the recovery timeout has elapsed, exactly one caller is let
    /// through as the probe; everyone else is refused until it reports back.
    pub fn allow_request(&self) -> bool {
        let (allowed, event) = {
            let mut s = self.state.lock();
            match s.state {
                CircuitState::Closed => (true, None),
                CircuitState::Open => {
                    if s.last_transition.elapsed() >= self.config.recovery_timeout() {
                        s.transition(CircuitState::HalfOpen);
                        s.probe_in_flight = true;
                        (true, Some(types::BREAKER_HALF_OPEN))
                    } else {
                        (false, None)
                    }
                }
                CircuitState::HalfOpen => {
                    if s.probe_in_flight {
                        (false, None)
                    } else {
                        s.probe_in_flight = true;
                        (true, None)
                    }
                }
            }
        };

        if let Some(event) = event {
            info!(dependency = %self.name, "Circuit breaker half-open, allowing probe");
            self.emit(event, 0);
        } else if !allowed {
            debug!(dependency = %self.name, "Circuit breaker refused request");
        }
        allowed
    }

    /// Records a successful attempt. Any success closes the breaker.
    pub fn record_success(&self) {
        let closed = {
            let mut s = self.state.lock();
            s.consecutive_failures = 0;
            s.probe_in_flight = false;
            if s.state == CircuitState::Closed {
                false
            } else {
                s.transition(CircuitState::Closed);
                true
            }
        };

        if closed {
            info!(dependency = %self.name, "Circuit breaker closed");
            self.emit(types::BREAKER_CLOSED, 0);
        }
    }

    /// Records a failed attempt.
    pub fn record_failure(&self) {
        let opened = {
            let mut s = self.state.lock();
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
            match s.state {
                CircuitState::Closed
                    if s.consecutive_failures >= self.config.failure_threshold =>
                {
                    s.transition(CircuitState::Open);
                    Some(s.consecutive_failures)
                }
                CircuitState::HalfOpen => {
                    s.probe_in_flight = false;
                    s.transition(CircuitState::Open);
                    Some(s.consecutive_failures)
                }
                CircuitState::Closed | CircuitState::Open => None,
            }
        };

        if let Some(failures) = opened {
            warn!(
                dependency = %self.name,
                consecutive_failures = failures,
                recovery_timeout_ms = self.config.recovery_timeout_ms,
                "Circuit breaker opened"
            );
            self.emit(types::BREAKER_OPENED, failures);
        }
    }

    fn emit(&self, event_type: &str, consecutive_failures: u32) {
        self.events.try_emit(
            event_type,
            Some(json!({
                "dependency": self.name,
                "consecutive_failures": consecutive_failures,
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;

    fn breaker(threshold: u32, recovery_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "risk-api",
            BreakerConfig::default()
                .with_failure_threshold(threshold)
                .with_recovery_timeout(Duration::from_millis(recovery_ms)),
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let b = breaker(3, 1_000);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.allow_request());

        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);
        assert!(!b.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_counter() {
        let b = breaker(3, 1_000);
        b.record_failure();
        b.record_failure();
        b.record_success();
        assert_eq!(b.consecutive_failures(), 0);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_after_recovery_timeout() {
        let b = breaker(3, 1_000);
        for _ in 0..3 {
            b.record_failure();
        }

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!b.allow_request());
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(b.allow_request());
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert!(!b.allow_request());
        assert!(!b.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_success_closes() {
        let b = breaker(1, 1_000);
        b.record_failure();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(b.allow_request());

        b.record_success();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.consecutive_failures(), 0);
        assert!(b.allow_request());
        assert!(b.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens_and_resets_timer() {
        let b = breaker(1, 1_000);
        b.record_failure();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(b.allow_request());

        tokio::time::advance(Duration::from_millis(500)).await;
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!b.allow_request());
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(b.allow_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_is_a_pure_view() {
        let b = breaker(1, 1_000);
        b.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(b.state(), CircuitState::Open);
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let b = breaker(2, 100).with_event_sink(sink.clone());

        b.record_failure();
        b.record_failure();
        b.record_failure();
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(b.allow_request());
        b.record_success();

        assert_eq!(
            sink.event_types(),
            vec!["breaker.opened", "breaker.half_open", "breaker.closed"]
        );
        let (_, data) = &sink.events()[0];
        assert_eq!(data.as_ref().unwrap()["dependency"], "risk-api");
        assert_eq!(data.as_ref().unwrap()["consecutive_failures"], 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_get_one_probe() {
        let b = Arc::new(breaker(1, 0));
        b.record_failure();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let b = Arc::clone(&b);
            handles.push(tokio::spawn(async move { b.allow_request() }));
        }
        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }
}

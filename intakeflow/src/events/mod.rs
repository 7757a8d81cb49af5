//! Event sinks for pipeline and breaker lifecycle events.
//!
//! Sinks are constructed by the caller and injected into the components that
//! emit; there is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names emitted by this crate.
pub mod types {
    /// A fresh pipeline run began.
    pub const SUBMISSION_STARTED: &str = "submission.started";
    /// A stored result was returned instead of running the chain.
    pub const SUBMISSION_REPLAYED: &str = "submission.replayed";
    /// A pipeline run finished and its result was stored.
    pub const SUBMISSION_COMPLETED: &str = "submission.completed";
    /// A pipeline run hit an unexpected failure and was not stored.
    pub const SUBMISSION_FAULTED: &str = "submission.faulted";
    /// A breaker started rejecting calls.
    pub const BREAKER_OPENED: &str = "breaker.opened";
    /// A breaker admitted a recovery probe.
    pub const BREAKER_HALF_OPEN: &str = "breaker.half_open";
    /// A breaker resumed normal operation.
    pub const BREAKER_CLOSED: &str = "breaker.closed";
}

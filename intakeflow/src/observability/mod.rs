//! Observability utilities.
//!
//! Logging setup for binaries embedding the pipeline, plus the payload
//! builders used for lifecycle events.

mod logging;
mod wide_events;

pub use logging::{init_tracing, LogFormat};
pub use wide_events::{submission_payload, RunTimer};

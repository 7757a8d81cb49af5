//! # Intakeflow
//!
//! A resilient orchestration layer for insurance submission intake.
//!
//! Intakeflow runs each raw broker submission through a fixed chain of
//! handlers and guards the whole run with idempotency:
//!
//! - **Idempotent runs**: content-hash keys, double-checked per-key locking,
//!   and a pluggable result store, so redeliveries replay instead of rerun
//! - **Handler chain**: Idempotency → Validation → Triage → Deduplication →
//!   Enrichment, where each stage owns its continue/stop decision
//! - **Resilient enrichment**: a circuit breaker gating a retrying call with
//!   exponential backoff and error classification
//! - **Bounded fan-out**: batch runs stream per-item results in completion
//!   order, with failures isolated per item
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use intakeflow::prelude::*;
//!
//! let pipeline = SubmissionPipeline::builder(IntakeConfig::default())
//!     .risk_api(Arc::new(HttpRiskApi::new("https://risk.example.com")?))
//!     .events(Arc::new(LoggingEventSink::default()))
//!     .build()?;
//!
//! let ctx = pipeline.run(payload).await?;
//! println!("{} (replay: {})", ctx.status(), ctx.was_replay());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod batch;
pub mod config;
pub mod core;
pub mod enrichment;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod idempotency;
pub mod observability;
pub mod pipeline;
pub mod ports;
pub mod resilience;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::{BatchItemResult, BatchOutcome, BatchReport, ConcurrentBatchRunner};
    pub use crate::config::{BatchConfig, IdempotencyConfig, IntakeConfig, ValidationConfig};
    pub use crate::core::{CleanSubmission, EnrichmentData, SubmissionContext, SubmissionStatus};
    pub use crate::enrichment::Enricher;
    pub use crate::errors::{CallError, GateError, IntakeflowError, RiskApiError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::handlers::{Handler, Next};
    pub use crate::idempotency::{
        IdempotencyGate, IdempotencyStore, InMemoryIdempotencyStore, ProcessingRecord,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{PipelineChain, SubmissionPipeline};
    #[cfg(feature = "http")]
    pub use crate::ports::HttpRiskApi;
    pub use crate::ports::{DuplicateCheck, RiskApi, TriageEvaluator, Validator};
    pub use crate::resilience::{
        BreakerConfig, CircuitBreaker, CircuitState, Classify, ErrorClass, RetryPolicy,
        RetryingCall,
    };
}

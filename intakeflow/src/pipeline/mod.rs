//! Pipeline assembly and execution.
//!
//! This module provides:
//! - [`PipelineChain`], an ordered handler sequence with a panic guard
//! - [`SubmissionPipeline`], the full intake chain wrapped in the
//!   idempotency gate, for single submissions and batches

mod chain;
mod submission;


pub use chain::{PipelineChain, PipelineChainBuilder};
pub use submission::{SubmissionPipeline, SubmissionPipelineBuilder, RISK_API_DEPENDENCY};

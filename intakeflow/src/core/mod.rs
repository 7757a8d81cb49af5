//! Core domain model types for intakeflow.
//!
//! This module contains the record threaded through the pipeline and its
//! status enum.

mod context;
mod status;

pub use context::{CleanSubmission, EnrichmentData, SubmissionContext};
pub use status::SubmissionStatus;

//! Testing utilities for intake pipelines.
//!
//! This module provides:
//! - A scriptable risk API and a fixed-answer duplicate check
//! - Recording and panicking handlers for chain tests
//! - Payload fixtures and context assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_enriched_with, assert_error_contains, assert_fresh, assert_no_errors, assert_replayed,
    assert_status, assert_warning_contains,
};
pub use fixtures::{clean_submission, valid_payload, PayloadBuilder};
pub use mocks::{
    risk_payload, PanickingHandler, RecordingHandler, ScriptedRiskApi, StaticDuplicateCheck,
};

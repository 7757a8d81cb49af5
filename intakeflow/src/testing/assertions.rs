//! Test assertions for submission contexts.

use crate::core::{SubmissionContext, SubmissionStatus};

/// Asserts that the context has the expected status.
pub fn assert_status(ctx: &SubmissionContext, expected: SubmissionStatus) {
    assert_eq!(
        ctx.status(),
        expected,
        "Expected status {:?}, got {:?} (errors: {:?}, warnings: {:?})",
        expected,
        ctx.status(),
        ctx.errors(),
        ctx.warnings()
    );
}

/// Asserts that the context came out of the idempotency store.
pub fn assert_replayed(ctx: &SubmissionContext) {
    assert!(
        ctx.was_replay(),
        "Expected a replayed context, got a fresh run {}",
        ctx.run_id()
    );
}

/// Asserts that the context was computed by this run.
pub fn assert_fresh(ctx: &SubmissionContext) {
    assert!(
        !ctx.was_replay(),
        "Expected a fresh run, got a replay of {}",
        ctx.run_id()
    );
}

/// Asserts that some warning contains `needle`.
pub fn assert_warning_contains(ctx: &SubmissionContext, needle: &str) {
    assert!(
        ctx.warnings().iter().any(|w| w.contains(needle)),
        "Expected a warning containing '{}', got {:?}",
        needle,
        ctx.warnings()
    );
}

/// Asserts that some error contains `needle`.
pub fn assert_error_contains(ctx: &SubmissionContext, needle: &str) {
    assert!(
        ctx.errors().iter().any(|e| e.contains(needle)),
        "Expected an error containing '{}', got {:?}",
        needle,
        ctx.errors()
    );
}

/// Asserts that no errors were recorded.
pub fn assert_no_errors(ctx: &SubmissionContext) {
    assert!(
        !ctx.has_errors(),
        "Expected no errors, got {:?}",
        ctx.errors()
    );
}

/// Asserts that enrichment attached `key`.
pub fn assert_enriched_with(ctx: &SubmissionContext, key: &str) {
    assert!(
        ctx.enrichment_data().contains_key(key),
        "Expected enrichment key '{}', got keys {:?}",
        key,
        ctx.enrichment_data().keys().collect::<Vec<_>>()
    );
}

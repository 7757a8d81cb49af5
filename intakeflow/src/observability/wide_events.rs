//! Wide event payloads for submission lifecycle events.

use serde_json::{json, Value};
use tokio::time::Instant;

use crate::core::SubmissionContext;

/// Builds the payload attached to `submission.completed` and
/// `submission.faulted` events.
///
/// Carries identifiers and outcome counts only, never the raw payload.
#[must_use]
pub fn submission_payload(ctx: &SubmissionContext, duration_ms: Option<f64>) -> Value {
    let mut payload = json!({
        "run_id": ctx.run_id().to_string(),
        "company_id": ctx.company_id(),
        "idempotency_key": ctx.idempotency_key(),
        "status": ctx.status().to_string(),
        "was_replay": ctx.was_replay(),
        "faulted": ctx.is_faulted(),
        "warning_count": ctx.warnings().len(),
        "error_count": ctx.errors().len(),
        "enriched_keys": ctx.enrichment_data().len(),
    });

    if let Some(ms) = duration_ms {
        payload["duration_ms"] = json!(ms);
    }
    if let Some(reason) = ctx.triage_reason() {
        payload["triage_reason"] = json!(reason);
    }

    payload
}

/// Simple elapsed-time helper for a pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct RunTimer {
    start: Instant,
}

impl RunTimer {
    /// Starts a timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

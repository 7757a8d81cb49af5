//! The mutable record threaded through the submission pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SubmissionStatus;

/// External risk data attached by the enrichment stage.
pub type EnrichmentData = serde_json::Map<String, serde_json::Value>;

/// A validated, coerced submission produced by the validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanSubmission {
    /// Company identifier.
    pub company_id: String,
    /// Company display name.
    pub company_name: String,
    /// Annual revenue.
    pub revenue: f64,
    /// Industry, title-cased.
    pub industry: String,
    /// State, upper-cased.
    pub state: String,
    /// Optional ZIP code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    /// Optional submitting broker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_id: Option<String>,
}

/// One submission's journey through the pipeline.
///
/// A context is owned by exactly one task at a time; handlers take it by
/// value and hand it on. Once an error is recorded the status is pinned to
/// [`SubmissionStatus::Error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionContext {
    run_id: Uuid,
    payload: serde_json::Value,
    status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    submission: Option<CleanSubmission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    triage_reason: Option<String>,
    #[serde(default)]
    enrichment_data: EnrichmentData,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    was_replay: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    faulted: bool,
}

impl SubmissionContext {
    /// Creates a fresh context for a raw payload.
    #[must_use]
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            payload,
            status: SubmissionStatus::Pending,
            company_id: None,
            submission: None,
            triage_reason: None,
            enrichment_data: EnrichmentData::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            was_replay: false,
            idempotency_key: None,
            faulted: false,
        }
    }

    /// The id of the run that produced this context.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The raw payload as delivered.
    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    /// Sets the status.
    ///
    /// Returns false (and leaves the status alone) when errors are already
    /// recorded and `status` is anything other than `Error`.
    pub fn set_status(&mut self, status: SubmissionStatus) -> bool {
        if self.has_errors() && status != SubmissionStatus::Error {
            tracing::warn!(
                run_id = %self.run_id,
                attempted = %status,
                "Refusing status change on a context with recorded errors"
            );
            return false;
        }
        self.status = status;
        true
    }

    /// The derived company identifier, once validation has run.
    #[must_use]
    pub fn company_id(&self) -> Option<&str> {
        self.company_id.as_deref()
    }

    /// The validated submission, once validation has run.
    #[must_use]
    pub fn submission(&self) -> Option<&CleanSubmission> {
        self.submission.as_ref()
    }

    /// Attaches the validated submission and derives the company id from it.
    pub fn set_submission(&mut self, submission: CleanSubmission) {
        self.company_id = Some(submission.company_id.clone());
        self.submission = Some(submission);
    }

    /// Reason given by the triage stage, if it had an opinion.
    #[must_use]
    pub fn triage_reason(&self) -> Option<&str> {
        self.triage_reason.as_deref()
    }

    /// Records the triage reason.
    pub fn set_triage_reason(&mut self, reason: impl Into<String>) {
        self.triage_reason = Some(reason.into());
    }

    /// External risk data; empty until enrichment succeeds.
    #[must_use]
    pub fn enrichment_data(&self) -> &EnrichmentData {
        &self.enrichment_data
    }

    /// Replaces the enrichment data.
    pub fn set_enrichment_data(&mut self, data: EnrichmentData) {
        self.enrichment_data = data;
    }

    /// Advisory, non-fatal messages in the order they were recorded.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Records a warning.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(
            run_id = %self.run_id,
            company_id = ?self.company_id,
            warning = %message,
            "Pipeline warning"
        );
        self.warnings.push(message);
    }

    /// Fatal messages in the order they were recorded.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Returns true if any fatal error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Records a fatal error and moves the status to `Error`.
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(
            run_id = %self.run_id,
            company_id = ?self.company_id,
            error = %message,
            "Pipeline error"
        );
        self.errors.push(message);
        self.status = SubmissionStatus::Error;
    }

    /// Records an unexpected stage failure.
    ///
    /// Faulted contexts are returned to the caller but never cached.
    pub fn record_fault(&mut self, stage: &str, error: impl std::fmt::Display) {
        self.add_error(format!("{stage} stage failed unexpectedly: {error}"));
        self.faulted = true;
    }

    /// Returns true if an unexpected stage failure was recorded.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Returns true if this context was replayed from the idempotency store.
    #[must_use]
    pub fn was_replay(&self) -> bool {
        self.was_replay
    }

    pub(crate) fn mark_replay(&mut self) {
        self.was_replay = true;
    }

    /// The idempotency key, once the gate has stamped it.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    /// Stamps the idempotency key. The key is set once; later calls are ignored.
    pub fn set_idempotency_key(&mut self, key: impl Into<String>) -> bool {
        if self.idempotency_key.is_some() {
            return false;
        }
        self.idempotency_key = Some(key.into());
        true
    }
}

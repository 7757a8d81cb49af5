//! Scriptable collaborators and handlers for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{CleanSubmission, EnrichmentData, SubmissionContext};
use crate::errors::RiskApiError;
use crate::handlers::{Handler, Next};
use crate::ports::{DuplicateCheck, DuplicateMatch, RiskApi};

type Outcome = Result<EnrichmentData, RiskApiError>;

/// A risk API whose answers are scripted per company id.
///
/// Each id holds a sequence of outcomes; call N returns outcome N and the
/// last outcome repeats once the sequence runs out. Ids with no script fail
/// with a 404 client error.
#[derive(Debug, Default)]
pub struct ScriptedRiskApi {
    scripts: Mutex<HashMap<String, Vec<Outcome>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedRiskApi {
    /// Creates an API with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a successful answer for `company_id`.
    ///
    /// Non-object values are wrapped as `{"value": ...}`.
    #[must_use]
    pub fn with_data(self, company_id: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            other => {
                let mut map = EnrichmentData::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self.push(company_id.into(), Ok(data));
        self
    }

    /// Appends a failing answer for `company_id`.
    #[must_use]
    pub fn with_error(self, company_id: impl Into<String>, error: RiskApiError) -> Self {
        self.push(company_id.into(), Err(error));
        self
    }

    /// Delays every answer for `company_id`.
    #[must_use]
    pub fn with_delay(self, company_id: impl Into<String>, delay: Duration) -> Self {
        self.delays.lock().insert(company_id.into(), delay);
        self
    }

    /// Number of fetches made for `company_id`.
    #[must_use]
    pub fn calls(&self, company_id: &str) -> usize {
        self.calls.lock().get(company_id).copied().unwrap_or(0)
    }

    /// Number of fetches made for any id.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    fn push(&self, company_id: String, outcome: Outcome) {
        self.scripts
            .lock()
            .entry(company_id)
            .or_default()
            .push(outcome);
    }

    fn next_outcome(&self, company_id: &str) -> Outcome {
        let call_index = {
            let mut calls = self.calls.lock();
            let count = calls.entry(company_id.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let scripts = self.scripts.lock();
        match scripts.get(company_id) {
            Some(outcomes) => outcomes
                .get(call_index)
                .or_else(|| outcomes.last())
                .cloned()
                .unwrap_or_else(|| Ok(EnrichmentData::new())),
            None => Err(RiskApiError::from_status(
                404,
                format!("Not Found for company {company_id}"),
            )),
        }
    }
}

#[async_trait]
impl RiskApi for ScriptedRiskApi {
    async fn fetch(&self, company_id: &str) -> Result<EnrichmentData, RiskApiError> {
        let outcome = self.next_outcome(company_id);
        let delay = self.delays.lock().get(company_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

/// A duplicate check that gives the same answer for every candidate.
#[derive(Debug)]
pub struct StaticDuplicateCheck {
    outcome: Result<DuplicateMatch, String>,
    calls: Mutex<usize>,
}

impl StaticDuplicateCheck {
    /// Never finds a duplicate.
    #[must_use]
    pub fn none() -> Self {
        Self::with_outcome(Ok(DuplicateMatch::none()))
    }

    /// Always matches `matched_id` with `score`.
    pub fn matched(matched_id: impl Into<String>, score: f64) -> Self {
        Self::with_outcome(Ok(DuplicateMatch::matched(matched_id, score)))
    }

    /// Always fails to run.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_outcome(Err(message.into()))
    }

    fn with_outcome(outcome: Result<DuplicateMatch, String>) -> Self {
        Self {
            outcome,
            calls: Mutex::new(0),
        }
    }

    /// Number of checks made.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl DuplicateCheck for StaticDuplicateCheck {
    async fn check(&self, _candidate: &CleanSubmission) -> anyhow::Result<DuplicateMatch> {
        *self.calls.lock() += 1;
        self.outcome.clone().map_err(anyhow::Error::msg)
    }
}

/// A handler that appends its name to a shared log and continues the chain.
#[derive(Debug, Clone)]
pub struct RecordingHandler {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    stop: bool,
}

impl RecordingHandler {
    /// Creates a pass-through recorder writing to `log`.
    pub fn new(name: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.into(),
            log,
            stop: false,
        }
    }

    /// Makes the handler return without calling the rest of the chain.
    #[must_use]
    pub fn stopping(mut self) -> Self {
        self.stop = true;
        self
    }
}

#[async_trait]
impl Handler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, mut ctx: SubmissionContext, next: Next<'_>) -> SubmissionContext {
        self.log.lock().push(self.name.clone());
        if self.stop {
            ctx.add_warning(format!("{} stopped the chain", self.name));
            return ctx;
        }
        next.run(ctx).await
    }
}

/// A handler that panics with a fixed message.
#[derive(Debug, Clone)]
pub struct PanickingHandler {
    message: String,
}

impl PanickingHandler {
    /// Creates a handler that panics with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Handler for PanickingHandler {
    fn name(&self) -> &str {
        "panicking"
    }

    #[allow(clippy::panic)]
    async fn handle(&self, _ctx: SubmissionContext, _next: Next<'_>) -> SubmissionContext {
        panic!("{}", self.message)
    }
}

/// Example risk payload in the API's camelCase shape.
#[must_use]
pub fn risk_payload(score: u32) -> Value {
    json!({
        "riskScore": score,
        "lossHistory": {"claimCount": 2, "totalIncurred": 125_000},
        "HTTPSEnabled": true
    })
}

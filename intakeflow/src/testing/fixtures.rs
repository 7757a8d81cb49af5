//! Ready-made submissions for tests.

use serde_json::{json, Value};

use crate::core::CleanSubmission;

/// A submission that passes every default triage rule.
pub fn clean_submission(company_id: impl Into<String>) -> CleanSubmission {
    CleanSubmission {
        company_id: company_id.into(),
        company_name: "Acme Corp".to_string(),
        revenue: 5_000_000.0,
        industry: "Retail".to_string(),
        state: "CA".to_string(),
        zip_code: Some("94105".to_string()),
        broker_id: None,
    }
}

/// A raw payload that validates into [`clean_submission`].
#[must_use]
pub fn valid_payload(company_id: &str) -> Value {
    json!({
        "company_id": company_id,
        "company_name": "Acme Corp",
        "revenue": "$5,000,000",
        "industry": "retail",
        "state": " ca ",
        "zip_code": "94105"
    })
}

/// Builder for payload variations.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    payload: serde_json::Map<String, Value>,
}

impl PayloadBuilder {
    /// Starts from [`valid_payload`].
    #[must_use]
    pub fn new(company_id: &str) -> Self {
        let payload = match valid_payload(company_id) {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self { payload }
    }

    /// Sets a field.
    #[must_use]
    pub fn with(mut self, field: &str, value: Value) -> Self {
        self.payload.insert(field.to_string(), value);
        self
    }

    /// Removes a field.
    #[must_use]
    pub fn without(mut self, field: &str) -> Self {
        self.payload.remove(field);
        self
    }

    /// Finishes the payload.
    #[must_use]
    pub fn build(self) -> Value {
        Value::Object(self.payload)
    }
}

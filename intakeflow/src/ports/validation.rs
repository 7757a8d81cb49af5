//! Field-level validation and coercion.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::config::ValidationConfig;
use crate::core::CleanSubmission;

static REVENUE_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[$,\s]").expect("revenue pattern is valid"));

/// Result of validating one raw payload.
///
/// Malformed input is a normal outcome: `submission` is `None` and
/// `errors` says why.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationOutcome {
    /// The coerced submission, when the payload was valid.
    pub submission: Option<CleanSubmission>,
    /// Every problem found, in field order.
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    /// A successful outcome.
    #[must_use]
    pub fn valid(submission: CleanSubmission) -> Self {
        Self {
            submission: Some(submission),
            errors: Vec::new(),
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            submission: None,
            errors,
        }
    }
}

/// Turns a raw payload into a [`CleanSubmission`] or a list of errors.
#[cfg_attr(test, mockall::automock)]
pub trait Validator: Send + Sync {
    /// Validates a payload. Never fails; problems are returned as data.
    fn validate(&self, payload: &Value) -> ValidationOutcome;
}

/// Default validator for broker submissions.
#[derive(Debug, Clone, Default)]
pub struct SubmissionValidator {
    config: ValidationConfig,
}

impl SubmissionValidator {
    /// Creates a validator with the given required fields.
    #[must_use]
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// The fields that must be present.
    #[must_use]
    pub fn required_fields(&self) -> &[String] {
        &self.config.required_fields
    }
}

impl Validator for SubmissionValidator {
    fn validate(&self, payload: &Value) -> ValidationOutcome {
        let Some(fields) = payload.as_object() else {
            return ValidationOutcome::invalid(vec![
                "Submission payload must be a JSON object".to_string(),
            ]);
        };

        let missing: Vec<&str> = self
            .config
            .required_fields
            .iter()
            .filter(|f| fields.get(f.as_str()).map_or(true, is_blank))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return ValidationOutcome::invalid(vec![format!(
                "Missing required fields: {}",
                missing.join(", ")
            )]);
        }

        let mut errors = Vec::new();
        let text = |name: &str| fields.get(name).and_then(as_text).unwrap_or_default();

        let company_id = text("company_id").trim().to_string();
        if company_id.is_empty() {
            errors.push("company_id must not be blank".to_string());
        }

        let revenue = match fields.get("revenue") {
            Some(value) => parse_revenue(value).unwrap_or_else(|e| {
                errors.push(e);
                0.0
            }),
            None => 0.0,
        };

        if !errors.is_empty() {
            return ValidationOutcome::invalid(errors);
        }

        let optional = |name: &str| {
            fields
                .get(name)
                .and_then(as_text)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        ValidationOutcome::valid(CleanSubmission {
            company_id,
            company_name: text("company_name").trim().to_string(),
            revenue,
            industry: title_case(text("industry").trim()),
            state: text("state").trim().to_uppercase(),
            zip_code: optional("zip_code"),
            broker_id: optional("broker_id"),
        })
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_revenue(value: &Value) -> Result<f64, String> {
    let revenue = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("Revenue is not representable: {n}"))?,
        Value::String(raw) => REVENUE_NOISE
            .replace_all(raw, "")
            .parse::<f64>()
            .map_err(|_| format!("Cannot parse revenue from string: '{raw}'"))?,
        other => return Err(format!("Revenue must be a number or numeric string, got {other}")),
    };

    if !revenue.is_finite() {
        return Err(format!("Revenue must be a finite number, got {revenue}"));
    }
    if revenue < 0.0 {
        return Err(format!("Revenue must not be negative, got {revenue}"));
    }
    Ok(revenue)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn validate(payload: &Value) -> ValidationOutcome {
        SubmissionValidator::default().validate(payload)
    }

    #[test]
    fn test_valid_payload_is_coerced() {
        let outcome = validate(&json!({
            "company_id": " ACME-001 ",
            "company_name": "Acme Corp",
            "revenue": "$1,250,000",
            "industry": "weapons MANUFACTURING",
            "state": " ny ",
            "zip_code": 10001,
        }));

        assert!(outcome.errors.is_empty());
        assert_eq!(
            outcome.submission,
            Some(CleanSubmission {
                company_id: "ACME-001".to_string(),
                company_name: "Acme Corp".to_string(),
                revenue: 1_250_000.0,
                industry: "Weapons Manufacturing".to_string(),
                state: "NY".to_string(),
                zip_code: Some("10001".to_string()),
                broker_id: None,
            })
        );
    }

    #[test]
    fn test_missing_fields_listed_in_order() {
        let outcome = validate(&json!({"company_id": "X", "industry": "", "state": null}));
        assert_eq!(outcome.submission, None);
        assert_eq!(
            outcome.errors,
            vec!["Missing required fields: company_name, revenue, industry, state"]
        );
    }

    #[test]
    fn test_unparsable_revenue() {
        let outcome = validate(&json!({
            "company_id": "X",
            "company_name": "X Ltd",
            "revenue": "bad",
            "industry": "Retail",
            "state": "CA",
        }));
        assert_eq!(outcome.errors, vec!["Cannot parse revenue from string: 'bad'"]);
    }

    #[test]
    fn test_blank_company_id() {
        let outcome = validate(&json!({
            "company_id": "   ",
            "company_name": "X Ltd",
            "revenue": 50_000,
            "industry": "Retail",
            "state": "CA",
        }));
        assert_eq!(outcome.errors, vec!["company_id must not be blank"]);
    }

    #[test]
    fn test_non_object_payload() {
        let outcome = validate(&json!(["not", "an", "object"]));
        assert_eq!(outcome.errors, vec!["Submission payload must be a JSON object"]);
    }

    #[test]
    fn test_negative_revenue() {
        assert!(parse_revenue(&json!(-5)).is_err());
        assert_eq!(parse_revenue(&json!("  2,500.50 ")), Ok(2_500.5));
    }

    #[test]
    fn test_custom_required_fields() {
        let validator = SubmissionValidator::new(ValidationConfig {
            required_fields: vec!["company_id".to_string(), "revenue".to_string()],
        });
        let outcome = validator.validate(&json!({"company_id": "X", "revenue": 20_000}));
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.submission.unwrap().industry, "");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("general   contracting"), "General Contracting");
        assert_eq!(title_case(""), "");
    }
}

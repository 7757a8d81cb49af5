//! Turns the raw payload into a validated submission.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::{Handler, Next};
use crate::core::{SubmissionContext, SubmissionStatus};
use crate::ports::Validator;

/// Validation stage.
///
/// Any validation error is recorded and stops the chain with status
/// `Error`. A valid payload attaches its [`CleanSubmission`] and moves the
/// status to `Valid`.
///
/// [`CleanSubmission`]: crate::core::CleanSubmission
#[derive(Clone)]
pub struct ValidationHandler {
    validator: Arc<dyn Validator>,
}

impl fmt::Debug for ValidationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationHandler").finish_non_exhaustive()
    }
}

impl ValidationHandler {
    /// Creates the handler over `validator`.
    pub fn new(validator: Arc<dyn Validator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Handler for ValidationHandler {
    fn name(&self) -> &str {
        "validation"
    }

    async fn handle(&self, mut ctx: SubmissionContext, next: Next<'_>) -> SubmissionContext {
        let outcome = self.validator.validate(ctx.payload());

        match outcome.submission {
            Some(submission) if outcome.errors.is_empty() => {
                ctx.set_submission(submission);
                ctx.set_status(SubmissionStatus::Valid);
                next.run(ctx).await
            }
            _ => {
                if outcome.errors.is_empty() {
                    ctx.add_error("Validation produced no submission");
                }
                for error in outcome.errors {
                    ctx.add_error(error);
                }
                info!(
                    run_id = %ctx.run_id(),
                    errors = ctx.errors().len(),
                    "Validation failed, stopping chain"
                );
                ctx
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::run_then_tail;
    use crate::ports::{MockValidator, SubmissionValidator, ValidationOutcome};
    use crate::testing::{clean_submission, valid_payload};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_valid_payload_continues() {
        let handler = ValidationHandler::new(Arc::new(SubmissionValidator::default()));
        let (ctx, continued) =
            run_then_tail(handler, SubmissionContext::new(valid_payload("ACME-001"))).await;

        assert!(continued);
        assert_eq!(ctx.status(), SubmissionStatus::Valid);
        assert_eq!(ctx.company_id(), Some("ACME-001"));
        assert_eq!(ctx.submission(), Some(&clean_submission("ACME-001")));
    }

    #[tokio::test]
    async fn test_invalid_payload_short_circuits() {
        let handler = ValidationHandler::new(Arc::new(SubmissionValidator::default()));
        let payload = json!({"company_id": "X", "revenue": "bad"});
        let (ctx, continued) = run_then_tail(handler, SubmissionContext::new(payload)).await;

        assert!(!continued);
        assert_eq!(ctx.status(), SubmissionStatus::Error);
        assert!(ctx.has_errors());
        assert!(ctx.submission().is_none());
    }

    #[tokio::test]
    async fn test_every_validator_error_is_recorded() {
        let mut validator = MockValidator::new();
        validator.expect_validate().times(1).returning(|_| {
            ValidationOutcome::invalid(vec!["first".to_string(), "second".to_string()])
        });

        let (ctx, continued) = run_then_tail(
            ValidationHandler::new(Arc::new(validator)),
            SubmissionContext::new(json!({})),
        )
        .await;

        assert!(!continued);
        assert_eq!(ctx.errors(), ["first", "second"]);
    }

    #[tokio::test]
    async fn test_empty_outcome_is_an_error() {
        let mut validator = MockValidator::new();
        validator
            .expect_validate()
            .returning(|_| ValidationOutcome::invalid(Vec::new()));

        let (ctx, continued) = run_then_tail(
            ValidationHandler::new(Arc::new(validator)),
            SubmissionContext::new(json!({})),
        )
        .await;

        assert!(!continued);
        assert_eq!(ctx.errors(), ["Validation produced no submission"]);
    }
}

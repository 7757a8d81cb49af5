//! Appetite triage stage.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::{Handler, Next};
use crate::core::{SubmissionContext, SubmissionStatus};
use crate::ports::{TriageEvaluator, TriageVerdict};

/// Triage stage.
///
/// | Verdict       | Effect                                               |
/// |---------------|------------------------------------------------------|
/// | Declined      | status `Declined`, reason recorded, chain stops      |
/// | ManualReview  | status `ManualReview`, reason + warning, continues   |
/// | NoOpinion     | continues untouched                                  |
///
/// An evaluator error is a fault and stops the chain.
#[derive(Clone)]
pub struct TriageHandler {
    evaluator: Arc<dyn TriageEvaluator>,
}

impl fmt::Debug for TriageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriageHandler").finish_non_exhaustive()
    }
}

impl TriageHandler {
    /// Creates the handler over `evaluator`.
    pub fn new(evaluator: Arc<dyn TriageEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl Handler for TriageHandler {
    fn name(&self) -> &str {
        "triage"
    }

    async fn handle(&self, mut ctx: SubmissionContext, next: Next<'_>) -> SubmissionContext {
        let Some(submission) = ctx.submission().cloned() else {
            ctx.record_fault(self.name(), "no validated submission on context");
            return ctx;
        };

        let decision = match self.evaluator.evaluate(&submission) {
            Ok(decision) => decision,
            Err(e) => {
                ctx.record_fault(self.name(), format!("{e:#}"));
                return ctx;
            }
        };

        let reason = decision.reason.unwrap_or_default();
        match decision.verdict {
            TriageVerdict::Declined => {
                info!(company_id = %submission.company_id, reason = %reason, "Submission declined");
                ctx.set_triage_reason(reason);
                ctx.set_status(SubmissionStatus::Declined);
                ctx
            }
            TriageVerdict::ManualReview => {
                ctx.add_warning(format!("Manual review required: {reason}"));
                ctx.set_triage_reason(reason);
                ctx.set_status(SubmissionStatus::ManualReview);
                next.run(ctx).await
            }
            TriageVerdict::NoOpinion => next.run(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::run_then_tail;
    use crate::ports::{AppetiteRules, MockTriageEvaluator, TriageDecision};
    use crate::testing::clean_submission;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn valid_ctx(industry: &str, state: &str, revenue: f64) -> SubmissionContext {
        let mut submission = clean_submission("ACME-001");
        submission.industry = industry.to_string();
        submission.state = state.to_string();
        submission.revenue = revenue;

        let mut ctx = SubmissionContext::new(json!({}));
        ctx.set_submission(submission);
        ctx.set_status(SubmissionStatus::Valid);
        ctx
    }

    fn rules() -> TriageHandler {
        TriageHandler::new(Arc::new(AppetiteRules::default()))
    }

    #[tokio::test]
    async fn test_declined_short_circuits() {
        let (ctx, continued) =
            run_then_tail(rules(), valid_ctx("Gambling", "NV", 2_000_000.0)).await;

        assert!(!continued);
        assert_eq!(ctx.status(), SubmissionStatus::Declined);
        assert_eq!(ctx.triage_reason(), Some("Industry 'Gambling' is outside our appetite."));
        assert!(ctx.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_manual_review_passes_through_with_warning() {
        let (ctx, continued) =
            run_then_tail(rules(), valid_ctx("Construction", "NY", 2_000_000.0)).await;

        assert!(continued);
        assert_eq!(ctx.status(), SubmissionStatus::ManualReview);
        assert_eq!(ctx.warnings().len(), 1);
        assert!(ctx.warnings()[0].starts_with("Manual review required: "));
        assert!(ctx.triage_reason().is_some());
    }

    #[tokio::test]
    async fn test_no_opinion_leaves_context_alone() {
        let (ctx, continued) = run_then_tail(rules(), valid_ctx("Retail", "CA", 2_000_000.0)).await;

        assert!(continued);
        assert_eq!(ctx.status(), SubmissionStatus::Valid);
        assert!(ctx.triage_reason().is_none());
    }

    #[tokio::test]
    async fn test_evaluator_error_is_a_fault() {
        let mut evaluator = MockTriageEvaluator::new();
        evaluator
            .expect_evaluate()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("rules table unavailable")));

        let (ctx, continued) = run_then_tail(
            TriageHandler::new(Arc::new(evaluator)),
            valid_ctx("Retail", "CA", 2_000_000.0),
        )
        .await;

        assert!(!continued);
        assert!(ctx.is_faulted());
        assert_eq!(ctx.status(), SubmissionStatus::Error);
        assert_eq!(
            ctx.errors(),
            ["triage stage failed unexpectedly: rules table unavailable"]
        );
    }

    #[tokio::test]
    async fn test_mocked_manual_review() {
        let mut evaluator = MockTriageEvaluator::new();
        evaluator
            .expect_evaluate()
            .returning(|_| Ok(TriageDecision::manual_review("Large schedule")));

        let (ctx, continued) = run_then_tail(
            TriageHandler::new(Arc::new(evaluator)),
            valid_ctx("Retail", "CA", 2_000_000.0),
        )
        .await;

        assert!(continued);
        assert_eq!(ctx.warnings(), ["Manual review required: Large schedule"]);
    }
}

//! Risk enrichment stage.

use async_trait::async_trait;

use super::{Handler, Next};
use crate::core::SubmissionContext;
use crate::enrichment::Enricher;

/// Enrichment stage.
///
/// Never stops the chain. A failed or refused call leaves a warning and an
/// empty `enrichment_data`; see [`Enricher::apply`].
#[derive(Debug, Clone)]
pub struct EnrichmentHandler {
    enricher: Enricher,
}

impl EnrichmentHandler {
    /// Creates the handler over `enricher`.
    pub fn new(enricher: Enricher) -> Self {
        Self { enricher }
    }
}

#[async_trait]
impl Handler for EnrichmentHandler {
    fn name(&self) -> &str {
        "enrichment"
    }

    async fn handle(&self, ctx: SubmissionContext, next: Next<'_>) -> SubmissionContext {
        let ctx = self.enricher.apply(ctx).await;
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ConcurrentBatchRunner;
    use crate::core::SubmissionStatus;
    use crate::errors::RiskApiError;
    use crate::handlers::test_support::run_then_tail;
    use crate::resilience::{BreakerConfig, CircuitBreaker, RetryPolicy, RetryingCall};
    use crate::testing::{clean_submission, risk_payload, ScriptedRiskApi};
    use serde_json::json;
    use std::sync::Arc;

    fn handler(api: ScriptedRiskApi) -> EnrichmentHandler {
        let breaker = Arc::new(CircuitBreaker::new("risk-api", BreakerConfig::default()));
        EnrichmentHandler::new(Enricher::new(
            Arc::new(api),
            RetryingCall::new(RetryPolicy::default(), breaker),
            ConcurrentBatchRunner::default(),
        ))
    }

    fn valid_ctx() -> SubmissionContext {
        let mut ctx = SubmissionContext::new(json!({}));
        ctx.set_submission(clean_submission("ACME-001"));
        ctx.set_status(SubmissionStatus::Valid);
        ctx
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_continues_enriched() {
        let api = ScriptedRiskApi::new().with_data("ACME-001", risk_payload(42));
        let (ctx, continued) = run_then_tail(handler(api), valid_ctx()).await;

        assert!(continued);
        assert_eq!(ctx.status(), SubmissionStatus::Enriched);
        assert_eq!(
            ctx.enrichment_data()["loss_history"]["claim_count"],
            json!(2)
        );
        assert_eq!(ctx.enrichment_data()["https_enabled"], json!(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_degrade_to_warning() {
        let api = ScriptedRiskApi::new()
            .with_error("ACME-001", RiskApiError::from_status(503, "Service Unavailable"));
        let (ctx, continued) = run_then_tail(handler(api), valid_ctx()).await;

        assert!(continued);
        assert_eq!(ctx.status(), SubmissionStatus::Valid);
        assert!(ctx.enrichment_data().is_empty());
        assert_eq!(
            ctx.warnings(),
            ["Enrichment failed for ACME-001: Risk API server error (503): Service Unavailable"]
        );
    }
}

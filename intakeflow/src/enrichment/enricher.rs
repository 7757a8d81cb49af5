//! Single and batch enrichment against the risk API.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::normalize_keys;
use crate::batch::{BatchReport, ConcurrentBatchRunner};
use crate::core::{EnrichmentData, SubmissionContext, SubmissionStatus};
use crate::errors::{CallError, RiskApiError};
use crate::ports::RiskApi;
use crate::resilience::RetryingCall;

/// Fetches and attaches risk data, one company or many at a time.
#[derive(Clone)]
pub struct Enricher {
    api: Arc<dyn RiskApi>,
    call: RetryingCall,
    runner: ConcurrentBatchRunner,
}

impl fmt::Debug for Enricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enricher")
            .field("call", &self.call)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl Enricher {
    /// Creates an enricher.
    pub fn new(api: Arc<dyn RiskApi>, call: RetryingCall, runner: ConcurrentBatchRunner) -> Self {
        Self { api, call, runner }
    }

    /// The retrying call (and through it, the breaker) in use.
    #[must_use]
    pub fn call(&self) -> &RetryingCall {
        &self.call
    }

    /// Fetches risk data for one company, with retries, keys normalised.
    ///
    /// # Errors
    ///
    /// [`CallError::CircuitOpen`] if the breaker refused the call, or
    /// [`CallError::Failed`] with the last attempt's [`RiskApiError`].
    pub async fn enrich_one(
        &self,
        company_id: &str,
    ) -> Result<EnrichmentData, CallError<RiskApiError>> {
        self.call
            .call(|| self.api.fetch(company_id))
            .await
            .map(normalize_keys)
    }

    /// Enriches a context in place of the pipeline's enrichment stage.
    ///
    /// Any failure becomes a warning; `enrichment_data` stays empty and the
    /// status is left alone. On success a `Valid` submission becomes
    /// `Enriched`; other statuses are kept.
    pub async fn apply(&self, mut ctx: SubmissionContext) -> SubmissionContext {
        let Some(company_id) = ctx.company_id().map(str::to_string) else {
            ctx.add_warning("Enrichment skipped: submission has no company id");
            return ctx;
        };

        match self.enrich_one(&company_id).await {
            Ok(data) => {
                info!(company_id = %company_id, keys = data.len(), "Enrichment succeeded");
                ctx.set_enrichment_data(data);
                if ctx.status() == SubmissionStatus::Valid {
                    ctx.set_status(SubmissionStatus::Enriched);
                }
            }
            Err(CallError::CircuitOpen { dependency }) => {
                warn!(company_id = %company_id, %dependency, "Enrichment skipped, breaker open");
                ctx.add_warning(format!(
                    "Enrichment skipped: {dependency} circuit breaker is open"
                ));
            }
            Err(CallError::Failed(err)) => {
                ctx.add_warning(format!("Enrichment failed for {company_id}: {err}"));
            }
        }
        ctx
    }

    /// Fetches risk data for many companies across the worker pool.
    pub async fn enrich_batch<I, S>(&self, company_ids: I) -> BatchReport<EnrichmentData>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = company_ids.into_iter().map(Into::into).collect();
        let this = self.clone();
        self.runner
            .run(ids, move |id: String| {
                let this = this.clone();
                async move { this.enrich_one(&id).await }
            })
            .await
    }

    /// Applies [`apply`](Self::apply) to many contexts across the worker pool.
    pub async fn enrich_contexts(
        &self,
        contexts: Vec<SubmissionContext>,
    ) -> BatchReport<SubmissionContext> {
        let this = self.clone();
        self.runner
            .run(contexts, move |ctx| {
                let this = this.clone();
                async move { Ok::<_, Infallible>(this.apply(ctx).await) }
            })
            .await
    }
}

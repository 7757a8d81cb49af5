//! The assembled intake pipeline.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::chain::PipelineChain;
use crate::batch::{BatchReport, ConcurrentBatchRunner};
use crate::config::IntakeConfig;
use crate::core::SubmissionContext;
use crate::enrichment::Enricher;
use crate::errors::{GateError, IntakeflowError};
use crate::events::{types, EventSink, NoOpEventSink};
use crate::handlers::{
    DeduplicationHandler, EnrichmentHandler, IdempotencyHandler, TriageHandler, ValidationHandler,
};
use crate::idempotency::{IdempotencyGate, IdempotencyStore, InMemoryIdempotencyStore};
use crate::observability::{submission_payload, RunTimer};
use crate::ports::{
    AppetiteRules, DuplicateCheck, KnownCompanies, RiskApi, SubmissionValidator, TriageEvaluator,
    Validator,
};
use crate::resilience::{CircuitBreaker, RetryingCall};

/// Name of the breaker guarding the risk API.
pub const RISK_API_DEPENDENCY: &str = "risk-api";

/// Idempotency → Validation → Triage → Deduplication → Enrichment, with the
/// whole run wrapped in the idempotency gate.
///
/// The result is stored only after the full chain returns. Faulted runs are
/// returned but never stored, so the next delivery of the same payload runs
/// again from scratch.
#[derive(Clone)]
pub struct SubmissionPipeline {
    chain: Arc<PipelineChain>,
    gate: Arc<IdempotencyGate<SubmissionContext>>,
    enricher: Enricher,
    runner: ConcurrentBatchRunner,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionPipeline")
            .field("chain", &self.chain)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl SubmissionPipeline {
    /// Starts a builder with the given configuration.
    #[must_use]
    pub fn builder(config: IntakeConfig) -> SubmissionPipelineBuilder {
        SubmissionPipelineBuilder::new(config)
    }

    /// The handler chain.
    #[must_use]
    pub fn chain(&self) -> &PipelineChain {
        &self.chain
    }

    /// The idempotency gate.
    #[must_use]
    pub fn gate(&self) -> &IdempotencyGate<SubmissionContext> {
        &self.gate
    }

    /// The enricher, for batch enrichment outside a pipeline run.
    #[must_use]
    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// The breaker guarding the risk API.
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.enricher.call().breaker()
    }

    /// Processes one submission.
    ///
    /// Business outcomes, validation errors and faults all come back as a
    /// context.
    ///
    /// # Errors
    ///
    /// Only [`IntakeflowError::LockTimeout`], when a lock wait limit is
    /// configured and exceeded.
    pub async fn run(&self, payload: Value) -> Result<SubmissionContext, IntakeflowError> {
        let timer = RunTimer::start();
        let chain = &self.chain;
        let events = &self.events;

        let outcome = self
            .gate
            .process_once(&payload, |payload| async move {
                events.try_emit(types::SUBMISSION_STARTED, None);
                let ctx = chain.run_guarded(SubmissionContext::new(payload)).await;
                if ctx.is_faulted() {
                    Err(Box::new(ctx))
                } else {
                    Ok(ctx)
                }
            })
            .await;

        match outcome {
            Ok(record) if record.was_replay => {
                let mut ctx = record.result;
                ctx.mark_replay();
                info!(idempotency_key = %record.idempotency_key, "Submission replayed");
                self.events.try_emit(
                    types::SUBMISSION_REPLAYED,
                    Some(submission_payload(&ctx, Some(timer.elapsed_ms()))),
                );
                Ok(ctx)
            }
            Ok(record) => {
                let ctx = record.result;
                info!(
                    run_id = %ctx.run_id(),
                    status = %ctx.status(),
                    warnings = ctx.warnings().len(),
                    "Submission processed"
                );
                self.events.try_emit(
                    types::SUBMISSION_COMPLETED,
                    Some(submission_payload(&ctx, Some(timer.elapsed_ms()))),
                );
                Ok(ctx)
            }
            Err(GateError::Work(ctx)) => {
                let mut ctx = *ctx;
                ctx.set_idempotency_key(self.gate.derive_key(&payload));
                warn!(
                    run_id = %ctx.run_id(),
                    errors = ?ctx.errors(),
                    "Submission faulted; not cached"
                );
                self.events.try_emit(
                    types::SUBMISSION_FAULTED,
                    Some(submission_payload(&ctx, Some(timer.elapsed_ms()))),
                );
                Ok(ctx)
            }
            Err(GateError::LockTimeout { key, waited_ms }) => {
                Err(IntakeflowError::LockTimeout { key, waited_ms })
            }
        }
    }

    /// Processes many submissions across the worker pool.
    ///
    /// A lock timeout for one payload becomes that item's failure.
    pub async fn run_batch<I>(&self, payloads: I) -> BatchReport<SubmissionContext>
    where
        I: IntoIterator<Item = Value>,
    {
        let this = self.clone();
        self.runner
            .run(payloads, move |payload| {
                let this = this.clone();
                async move { this.run(payload).await }
            })
            .await
    }
}

/// Assembles a [`SubmissionPipeline`].
///
/// Only the risk API is required; every other collaborator has a default.
pub struct SubmissionPipelineBuilder {
    config: IntakeConfig,
    store: Option<Arc<dyn IdempotencyStore<SubmissionContext>>>,
    validator: Option<Arc<dyn Validator>>,
    triage: Option<Arc<dyn TriageEvaluator>>,
    dedup: Option<Arc<dyn DuplicateCheck>>,
    risk_api: Option<Arc<dyn RiskApi>>,
    breaker: Option<Arc<CircuitBreaker>>,
    events: Option<Arc<dyn EventSink>>,
}

impl fmt::Debug for SubmissionPipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionPipelineBuilder")
            .field("config", &self.config)
            .field("has_risk_api", &self.risk_api.is_some())
            .finish_non_exhaustive()
    }
}

impl SubmissionPipelineBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(config: IntakeConfig) -> Self {
        Self {
            config,
            store: None,
            validator: None,
            triage: None,
            dedup: None,
            risk_api: None,
            breaker: None,
            events: None,
        }
    }

    /// Uses `store` for idempotency records. Defaults to in-memory.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn IdempotencyStore<SubmissionContext>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses `validator`. Defaults to [`SubmissionValidator`].
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Uses `triage`. Defaults to [`AppetiteRules::default`].
    #[must_use]
    pub fn triage(mut self, triage: Arc<dyn TriageEvaluator>) -> Self {
        self.triage = Some(triage);
        self
    }

    /// Uses `dedup`. Defaults to an empty [`KnownCompanies`].
    #[must_use]
    pub fn dedup(mut self, dedup: Arc<dyn DuplicateCheck>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// Uses `risk_api` for enrichment. Required.
    #[must_use]
    pub fn risk_api(mut self, risk_api: Arc<dyn RiskApi>) -> Self {
        self.risk_api = Some(risk_api);
        self
    }

    /// Shares an existing breaker instead of building one from the config.
    #[must_use]
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Sends pipeline and breaker events to `events`.
    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// [`IntakeflowError::Config`] if the configuration is invalid or no
    /// risk API was given.
    pub fn build(self) -> Result<SubmissionPipeline, IntakeflowError> {
        self.config.validate()?;
        let risk_api = self
            .risk_api
            .ok_or_else(|| IntakeflowError::config("a risk API is required"))?;

        let events = self
            .events
            .unwrap_or_else(|| Arc::new(NoOpEventSink) as Arc<dyn EventSink>);
        let breaker = self.breaker.unwrap_or_else(|| {
            Arc::new(
                CircuitBreaker::new(RISK_API_DEPENDENCY, self.config.breaker)
                    .with_event_sink(Arc::clone(&events)),
            )
        });
        let store: Arc<dyn IdempotencyStore<SubmissionContext>> = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryIdempotencyStore::new()));
        let validator = self.validator.unwrap_or_else(|| {
            Arc::new(SubmissionValidator::new(self.config.validation.clone())) as Arc<dyn Validator>
        });
        let triage = self
            .triage
            .unwrap_or_else(|| Arc::new(AppetiteRules::default()) as Arc<dyn TriageEvaluator>);
        let dedup = self
            .dedup
            .unwrap_or_else(|| Arc::new(KnownCompanies::default()) as Arc<dyn DuplicateCheck>);

        let gate = Arc::new(IdempotencyGate::new(store, &self.config.idempotency));
        let runner = ConcurrentBatchRunner::from_config(&self.config.batch);
        let enricher = Enricher::new(
            risk_api,
            RetryingCall::new(self.config.retry.clone(), breaker),
            runner,
        );

        let chain = PipelineChain::builder()
            .link(IdempotencyHandler::new(Arc::clone(&gate)))
            .link(ValidationHandler::new(validator))
            .link(TriageHandler::new(triage))
            .link(DeduplicationHandler::new(dedup))
            .link(EnrichmentHandler::new(enricher.clone()))
            .build();

        info!(
            handlers = ?chain.handler_names().collect::<Vec<_>>(),
            max_workers = runner.max_workers(),
            "Submission pipeline built"
        );

        Ok(SubmissionPipeline {
            chain: Arc::new(chain),
            gate,
            enricher,
            runner,
            events,
        })
    }
}

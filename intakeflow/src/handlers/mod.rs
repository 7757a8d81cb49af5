//! Handler trait and the intake stages.
//!
//! A handler receives the context and the rest of the chain. It either
//! calls [`Next::run`] to continue or returns the context to stop the chain
//! (a hard short-circuit). The chain itself never branches; every handler
//! owns its continue/stop decision.

mod dedup;
mod enrichment;
mod idempotency;
mod triage;
mod validation;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use crate::core::SubmissionContext;

pub use dedup::DeduplicationHandler;
pub use enrichment::EnrichmentHandler;
pub use idempotency::IdempotencyHandler;
pub use triage::TriageHandler;
pub use validation::ValidationHandler;

/// One stage of the intake chain.
#[async_trait]
pub trait Handler: Send + Sync + Debug {
    /// Returns the name of the handler.
    fn name(&self) -> &str;

    /// Handles the context.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The submission context, owned for the duration of the call
    /// * `next` - The remaining handlers; call [`Next::run`] to continue
    ///
    /// # Returns
    ///
    /// The context the caller should persist.
    async fn handle(&self, ctx: SubmissionContext, next: Next<'_>) -> SubmissionContext;
}

/// The handlers after the current one.
#[derive(Debug, Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Arc<dyn Handler>],
}

impl<'a> Next<'a> {
    /// Wraps a handler sequence; running it starts with the first handler.
    #[must_use]
    pub fn new(handlers: &'a [Arc<dyn Handler>]) -> Self {
        Self { rest: handlers }
    }

    /// An empty continuation: running it returns the context unchanged.
    #[must_use]
    pub fn end() -> Next<'static> {
        Next { rest: &[] }
    }

    /// Number of handlers still to run.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// Passes the context to the next handler, or returns it at the end.
    pub async fn run(self, ctx: SubmissionContext) -> SubmissionContext {
        match self.rest.split_first() {
            Some((handler, rest)) => {
                debug!(handler = handler.name(), run_id = %ctx.run_id(), "Entering handler");
                handler.handle(ctx, Next { rest }).await
            }
            None => ctx,
        }
    }
}

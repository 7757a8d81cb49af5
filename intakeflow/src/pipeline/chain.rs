//! Ordered handler chain.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::error;

use crate::batch::panic_message;
use crate::core::SubmissionContext;
use crate::handlers::{Handler, Next};

/// A fixed sequence of handlers run strictly in order.
#[derive(Debug, Clone, Default)]
pub struct PipelineChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl PipelineChain {
    /// Starts a chain; link handlers in execution order.
    #[must_use]
    pub fn builder() -> PipelineChainBuilder {
        PipelineChainBuilder::default()
    }

    /// Handler names in execution order.
    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.name())
    }

    /// Number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if the chain has no handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the chain. A panicking handler unwinds through this call.
    pub async fn run(&self, ctx: SubmissionContext) -> SubmissionContext {
        Next::new(&self.handlers).run(ctx).await
    }

    /// Runs the chain, converting a panic into a faulted context for the
    /// same payload.
    pub async fn run_guarded(&self, ctx: SubmissionContext) -> SubmissionContext {
        let payload = ctx.payload().clone();
        let key = ctx.idempotency_key().map(str::to_string);

        match AssertUnwindSafe(self.run(ctx)).catch_unwind().await {
            Ok(ctx) => ctx,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Handler panicked; returning faulted context");
                let mut faulted = SubmissionContext::new(payload);
                if let Some(key) = key {
                    faulted.set_idempotency_key(key);
                }
                faulted.record_fault("pipeline", message);
                faulted
            }
        }
    }
}

/// Links handlers into a [`PipelineChain`].
#[derive(Debug, Default)]
pub struct PipelineChainBuilder {
    handlers: Vec<Arc<dyn Handler>>,
}

impl PipelineChainBuilder {
    /// Appends a handler.
    #[must_use]
    pub fn link(self, handler: impl Handler + 'static) -> Self {
        self.link_arc(Arc::new(handler))
    }

    /// Appends a shared handler.
    #[must_use]
    pub fn link_arc(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Finishes the chain.
    #[must_use]
    pub fn build(self) -> PipelineChain {
        PipelineChain {
            handlers: self.handlers,
        }
    }
}

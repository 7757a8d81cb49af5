//! Replays stored results before any other stage runs.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{Handler, Next};
use crate::core::SubmissionContext;
use crate::idempotency::IdempotencyGate;

/// First stage of the chain.
///
/// A stored result for the payload's key is returned as-is with
/// `was_replay` set, and nothing else runs. Otherwise the key is stamped on
/// the context and the chain continues. This handler only reads the store;
/// writing is left to whoever owns the whole run, so a partial result is
/// never cached.
#[derive(Debug, Clone)]
pub struct IdempotencyHandler {
    gate: Arc<IdempotencyGate<SubmissionContext>>,
}

impl IdempotencyHandler {
    /// Creates the handler over `gate`.
    pub fn new(gate: Arc<IdempotencyGate<SubmissionContext>>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Handler for IdempotencyHandler {
    fn name(&self) -> &str {
        "idempotency"
    }

    async fn handle(&self, mut ctx: SubmissionContext, next: Next<'_>) -> SubmissionContext {
        let (key, stored) = self.gate.lookup(ctx.payload()).await;
        if let Some(record) = stored {
            info!(idempotency_key = %key, "Replaying stored submission result");
            let mut replayed = record.result;
            replayed.mark_replay();
            return replayed;
        }

        ctx.set_idempotency_key(key);
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdempotencyConfig;
    use crate::core::SubmissionStatus;
    use crate::handlers::test_support::run_then_tail;
    use crate::idempotency::InMemoryIdempotencyStore;
    use serde_json::json;

    fn gate() -> Arc<IdempotencyGate<SubmissionContext>> {
        Arc::new(IdempotencyGate::new(
            Arc::new(InMemoryIdempotencyStore::new()),
            &IdempotencyConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_miss_stamps_key_and_continues() {
        let gate = gate();
        let payload = json!({"company_id": "ACME-001"});
        let (ctx, continued) = run_then_tail(
            IdempotencyHandler::new(Arc::clone(&gate)),
            SubmissionContext::new(payload.clone()),
        )
        .await;

        assert!(continued);
        assert!(!ctx.was_replay());
        assert_eq!(ctx.idempotency_key(), Some(gate.derive_key(&payload).as_str()));
    }

    #[tokio::test]
    async fn test_hit_replays_and_short_circuits() {
        let gate = gate();
        let payload = json!({"company_id": "ACME-001"});

        let mut stored = SubmissionContext::new(payload.clone());
        stored.set_idempotency_key(gate.derive_key(&payload));
        stored.add_error("Missing required fields: revenue");
        gate.store()
            .set_if_absent(&gate.derive_key(&payload), stored.clone())
            .await;

        let (ctx, continued) =
            run_then_tail(IdempotencyHandler::new(gate), SubmissionContext::new(payload)).await;

        assert!(!continued);
        assert!(ctx.was_replay());
        assert_eq!(ctx.run_id(), stored.run_id());
        assert_eq!(ctx.errors(), stored.errors());
        assert_eq!(ctx.status(), SubmissionStatus::Error);
    }
}

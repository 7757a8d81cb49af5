//! Duplicate detection stage.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::{Handler, Next};
use crate::core::{SubmissionContext, SubmissionStatus};
use crate::ports::DuplicateCheck;

/// Deduplication stage.
///
/// A potential duplicate is flagged (status `Duplicate`, warning) but the
/// chain continues; the enriched result is still useful to a reviewer. A
/// check that cannot run is a fault and stops the chain.
#[derive(Clone)]
pub struct DeduplicationHandler {
    check: Arc<dyn DuplicateCheck>,
}

impl fmt::Debug for DeduplicationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeduplicationHandler").finish_non_exhaustive()
    }
}

impl DeduplicationHandler {
    /// Creates the handler over `check`.
    pub fn new(check: Arc<dyn DuplicateCheck>) -> Self {
        Self { check }
    }
}

#[async_trait]
impl Handler for DeduplicationHandler {
    fn name(&self) -> &str {
        "deduplication"
    }

    async fn handle(&self, mut ctx: SubmissionContext, next: Next<'_>) -> SubmissionContext {
        let Some(submission) = ctx.submission().cloned() else {
            ctx.record_fault(self.name(), "no validated submission on context");
            return ctx;
        };

        match self.check.check(&submission).await {
            Ok(found) if found.is_potential_duplicate => {
                let matched = found.matched_id.as_deref().unwrap_or("an existing submission");
                ctx.add_warning(format!(
                    "Potential duplicate of {matched} (score {:.0})",
                    found.score
                ));
                ctx.set_status(SubmissionStatus::Duplicate);
                next.run(ctx).await
            }
            Ok(_) => next.run(ctx).await,
            Err(e) => {
                ctx.record_fault(self.name(), format!("{e:#}"));
                ctx
            }
        }
    }
}

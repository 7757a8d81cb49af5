//! Bounded worker pool with completion-order results.

use futures::stream::{FuturesUnordered, StreamExt};
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{BatchItemResult, BatchOutcome, BatchReport};
use crate::config::BatchConfig;

/// Runs a function over many items with at most `max_workers` in flight.
///
/// Every item runs in its own task, so a panic or error in one item becomes
/// that item's failure result and never touches its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrentBatchRunner {
    max_workers: usize,
}

impl Default for ConcurrentBatchRunner {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default())
    }
}

impl ConcurrentBatchRunner {
    /// Creates a runner. A pool size of zero is treated as one.
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Creates a runner from configuration.
    #[must_use]
    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(config.max_workers)
    }

    /// The pool size.
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Runs `work` over `items` and waits for all of them.
    pub async fn run<I, T, E, F, Fut>(&self, items: I, work: F) -> BatchReport<T>
    where
        I: IntoIterator,
        I::Item: Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(I::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.run_with(items, work, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_result` for each item as soon as
    /// it completes.
    pub async fn run_with<I, T, E, F, Fut, C>(
        &self,
        items: I,
        work: F,
        mut on_result: C,
    ) -> BatchReport<T>
    where
        I: IntoIterator,
        I::Item: Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(I::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        C: FnMut(&BatchItemResult<T>),
    {
        let permits = Arc::new(Semaphore::new(self.max_workers));
        let work = Arc::new(work);
        let mut in_flight = FuturesUnordered::new();

        for (index, item) in items.into_iter().enumerate() {
            let permits = Arc::clone(&permits);
            let work = Arc::clone(&work);
            let handle = tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return BatchOutcome::Failure {
                        error: "worker pool closed".to_string(),
                    };
                };
                match (*work)(item).await {
                    Ok(value) => BatchOutcome::Success { value },
                    Err(e) => BatchOutcome::Failure {
                        error: e.to_string(),
                    },
                }
            });
            in_flight.push(async move { (index, handle.await) });
        }

        let mut results = Vec::with_capacity(in_flight.len());
        while let Some((index, joined)) = in_flight.next().await {
            let outcome = joined.unwrap_or_else(|join_err| {
                let error = if join_err.is_panic() {
                    format!("item panicked: {}", panic_message(join_err.into_panic().as_ref()))
                } else {
                    format!("item task failed: {join_err}")
                };
                warn!(index, error = %error, "Batch item aborted");
                BatchOutcome::Failure { error }
            });
            let result = BatchItemResult { index, outcome };
            debug!(index, success = result.is_success(), "Batch item completed");
            on_result(&result);
            results.push(result);
        }

        let report = BatchReport::from_results(results);
        info!(
            total = report.total(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            max_workers = self.max_workers,
            "Batch complete"
        );
        report
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

//! Per-item outcomes and the batch summary.

use serde::Serialize;

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome<T> {
    /// The item's work returned a value.
    Success {
        /// The value.
        value: T,
    },
    /// The item's work failed or panicked.
    Failure {
        /// Description of the failure.
        error: String,
    },
}

/// One item's outcome, tagged with its position in the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItemResult<T> {
    /// Zero-based index of the item in the submitted collection.
    pub index: usize,
    /// The outcome.
    #[serde(flatten)]
    pub outcome: BatchOutcome<T>,
}

impl<T> BatchItemResult<T> {
    /// Returns true if the item succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Success { .. })
    }

    /// The value, if the item succeeded.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match &self.outcome {
            BatchOutcome::Success { value } => Some(value),
            BatchOutcome::Failure { .. } => None,
        }
    }

    /// The failure description, if the item failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            BatchOutcome::Success { .. } => None,
            BatchOutcome::Failure { error } => Some(error),
        }
    }
}

/// Summary of a finished batch. Results are in completion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport<T> {
    total: usize,
    succeeded: usize,
    failed: usize,
    results: Vec<BatchItemResult<T>>,
}

impl<T> BatchReport<T> {
    pub(crate) fn from_results(results: Vec<BatchItemResult<T>>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Number of items submitted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of items that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Number of items that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Percentage of items that succeeded; 0 for an empty batch.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }

    /// Per-item results, in the order items completed.
    #[must_use]
    pub fn results(&self) -> &[BatchItemResult<T>] {
        &self.results
    }

    /// Consumes the report, returning the per-item results.
    #[must_use]
    pub fn into_results(self) -> Vec<BatchItemResult<T>> {
        self.results
    }

    /// Successful values, in completion order.
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.results.iter().filter_map(BatchItemResult::value)
    }
}

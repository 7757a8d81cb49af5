//! Bounded fan-out over independent items.

mod report;
mod runner;

pub use report::{BatchItemResult, BatchOutcome, BatchReport};
pub use runner::ConcurrentBatchRunner;
pub(crate) use runner::panic_message;

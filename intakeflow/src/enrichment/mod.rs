//! Risk data enrichment.
//!
//! The [`Enricher`] owns the risk API, the retrying call that guards it and
//! the batch runner, and applies the soft-failure policy: a failed lookup
//! becomes a warning on the context, never an error.

mod enricher;
mod mapper;

pub use enricher::Enricher;
pub use mapper::{camel_to_snake, normalize_keys};

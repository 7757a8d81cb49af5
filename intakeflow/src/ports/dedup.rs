//! Duplicate detection contract and an exact-id implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::CleanSubmission;

/// Result of a duplicate check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DuplicateMatch {
    /// True if the candidate probably repeats an existing submission.
    pub is_potential_duplicate: bool,
    /// The existing submission it matched, if any.
    pub matched_id: Option<String>,
    /// Match confidence, 0 to 100.
    pub score: f64,
}

impl DuplicateMatch {
    /// No match.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A match against `matched_id`.
    pub fn matched(matched_id: impl Into<String>, score: f64) -> Self {
        Self {
            is_potential_duplicate: true,
            matched_id: Some(matched_id.into()),
            score,
        }
    }
}

/// Looks for existing submissions that a candidate may repeat.
#[async_trait]
pub trait DuplicateCheck: Send + Sync {
    /// Checks one candidate.
    ///
    /// # Errors
    ///
    /// Only when the check itself could not run.
    async fn check(&self, candidate: &CleanSubmission) -> anyhow::Result<DuplicateMatch>;
}

/// Exact company-id matching against a known set.
#[derive(Debug, Default)]
pub struct KnownCompanies {
    ids: RwLock<HashSet<String>>,
}

impl KnownCompanies {
    /// Creates a checker seeded with `ids`.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: RwLock::new(ids.into_iter().map(Into::into).collect()),
        }
    }

    /// Adds a company id. Returns false if it was already known.
    pub fn register(&self, id: impl Into<String>) -> bool {
        self.ids.write().insert(id.into())
    }

    /// Number of known ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Returns true if no ids are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

#[async_trait]
impl DuplicateCheck for KnownCompanies {
    async fn check(&self, candidate: &CleanSubmission) -> anyhow::Result<DuplicateMatch> {
        if self.ids.read().contains(&candidate.company_id) {
            Ok(DuplicateMatch::matched(candidate.company_id.clone(), 100.0))
        } else {
            Ok(DuplicateMatch::none())
        }
    }
}

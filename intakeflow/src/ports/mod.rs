//! Collaborator contracts the pipeline stages call out to.
//!
//! Each stage depends only on its trait here; the default implementations
//! (`SubmissionValidator`, `AppetiteRules`, `KnownCompanies`, `HttpRiskApi`)
//! are ordinary implementors and can be swapped for any other.

mod dedup;
mod risk_api;
mod triage;
mod validation;

pub use dedup::{DuplicateCheck, DuplicateMatch, KnownCompanies};
#[cfg(feature = "http")]
pub use risk_api::HttpRiskApi;
pub use risk_api::RiskApi;
pub use triage::{
    AppetiteRules, RegionalReviewRule, RevenueBoundsRule, SanctionedIndustryRule, TriageDecision,
    TriageEvaluator, TriageRule, TriageVerdict,
};
pub use validation::{SubmissionValidator, ValidationOutcome, Validator};

#[cfg(test)]
pub use triage::MockTriageEvaluator;
#[cfg(test)]
pub use validation::MockValidator;

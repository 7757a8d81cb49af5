//! Appetite rules evaluated by the triage stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::core::CleanSubmission;

/// What the triage stage concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageVerdict {
    /// No rule fired; the chain continues.
    #[default]
    NoOpinion,
    /// Outside appetite; the chain stops.
    Declined,
    /// Needs an underwriter; the chain continues with a warning.
    ManualReview,
}

/// A verdict with its human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriageDecision {
    /// The verdict.
    pub verdict: TriageVerdict,
    /// Why, when a rule fired.
    pub reason: Option<String>,
}

impl TriageDecision {
    /// No rule fired.
    #[must_use]
    pub fn no_opinion() -> Self {
        Self::default()
    }

    /// Decline with a reason.
    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            verdict: TriageVerdict::Declined,
            reason: Some(reason.into()),
        }
    }

    /// Route to manual review with a reason.
    pub fn manual_review(reason: impl Into<String>) -> Self {
        Self {
            verdict: TriageVerdict::ManualReview,
            reason: Some(reason.into()),
        }
    }
}

/// Evaluates a validated submission against underwriting appetite.
#[cfg_attr(test, mockall::automock)]
pub trait TriageEvaluator: Send + Sync {
    /// Returns the verdict for a submission.
    ///
    /// # Errors
    ///
    /// Only for failures of the evaluator itself (for example an
    /// unavailable rules source), never for a business outcome.
    fn evaluate(&self, submission: &CleanSubmission) -> anyhow::Result<TriageDecision>;
}

/// One appetite rule. Returns `None` when it does not fire.
pub trait TriageRule: Send + Sync + fmt::Debug {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Checks the submission.
    fn check(&self, submission: &CleanSubmission) -> Option<TriageDecision>;
}

/// Declines revenue outside `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevenueBoundsRule {
    /// Lowest acceptable revenue.
    pub min: f64,
    /// Highest acceptable revenue.
    pub max: f64,
}

impl Default for RevenueBoundsRule {
    fn default() -> Self {
        Self {
            min: 10_000.0,
            max: 500_000_000.0,
        }
    }
}

impl TriageRule for RevenueBoundsRule {
    fn name(&self) -> &str {
        "revenue_bounds"
    }

    fn check(&self, submission: &CleanSubmission) -> Option<TriageDecision> {
        if submission.revenue > self.max {
            Some(TriageDecision::declined(format!(
                "Revenue {} exceeds the maximum appetite of {}.",
                submission.revenue, self.max
            )))
        } else if submission.revenue < self.min {
            Some(TriageDecision::declined(format!(
                "Revenue {} is below the minimum appetite of {}.",
                submission.revenue, self.min
            )))
        } else {
            None
        }
    }
}

/// Declines industries on a sanctions list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanctionedIndustryRule {
    industries: BTreeSet<String>,
}

impl Default for SanctionedIndustryRule {
    fn default() -> Self {
        Self::new(["Gambling", "Tobacco", "Weapons Manufacturing"])
    }
}

impl SanctionedIndustryRule {
    /// Creates a rule for the given (title-cased) industries.
    pub fn new<I, S>(industries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            industries: industries.into_iter().map(Into::into).collect(),
        }
    }
}

impl TriageRule for SanctionedIndustryRule {
    fn name(&self) -> &str {
        "sanctioned_industry"
    }

    fn check(&self, submission: &CleanSubmission) -> Option<TriageDecision> {
        self.industries.contains(&submission.industry).then(|| {
            TriageDecision::declined(format!(
                "Industry '{}' is outside our appetite.",
                submission.industry
            ))
        })
    }
}

/// Sends one industry in a set of states to manual review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionalReviewRule {
    industry: String,
    states: BTreeSet<String>,
    reason: String,
}

impl Default for RegionalReviewRule {
    fn default() -> Self {
        Self::new(
            "Construction",
            ["NY", "NEW YORK", "NEW YORK STATE"],
            "Construction submissions in New York require manual review \
             due to complex local regulations (e.g., Labor Law 240/241).",
        )
    }
}

impl RegionalReviewRule {
    /// Creates a rule for `industry` in any of `states` (upper-cased).
    pub fn new<I, S>(industry: impl Into<String>, states: I, reason: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            industry: industry.into(),
            states: states.into_iter().map(Into::into).collect(),
            reason: reason.into(),
        }
    }
}

impl TriageRule for RegionalReviewRule {
    fn name(&self) -> &str {
        "regional_review"
    }

    fn check(&self, submission: &CleanSubmission) -> Option<TriageDecision> {
        (submission.industry == self.industry && self.states.contains(&submission.state))
            .then(|| TriageDecision::manual_review(self.reason.clone()))
    }
}

/// Ordered rule list; the first rule that fires decides.
#[derive(Debug)]
pub struct AppetiteRules {
    rules: Vec<Box<dyn TriageRule>>,
}

impl Default for AppetiteRules {
    fn default() -> Self {
        Self::empty()
            .with_rule(RevenueBoundsRule::default())
            .with_rule(SanctionedIndustryRule::default())
            .with_rule(RegionalReviewRule::default())
    }
}

impl AppetiteRules {
    /// A rule set with no rules; every submission gets no opinion.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: impl TriageRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name())
    }
}

impl TriageEvaluator for AppetiteRules {
    fn evaluate(&self, submission: &CleanSubmission) -> anyhow::Result<TriageDecision> {
        for rule in &self.rules {
            if let Some(decision) = rule.check(submission) {
                tracing::debug!(
                    rule = rule.name(),
                    company_id = %submission.company_id,
                    verdict = ?decision.verdict,
                    "Triage rule fired"
                );
                return Ok(decision);
            }
        }
        Ok(TriageDecision::no_opinion())
    }
}

//! Submission status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a submission stands after the pipeline stages that ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// No stage has decided anything yet.
    #[default]
    Pending,
    /// Required fields are present and coerced.
    Valid,
    /// Outside underwriting appetite.
    Declined,
    /// Needs a human decision; the chain still runs to completion.
    ManualReview,
    /// Likely a repeat of an existing submission.
    Duplicate,
    /// External risk data was attached.
    Enriched,
    /// A fatal error was recorded.
    Error,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Valid => write!(f, "valid"),
            Self::Declined => write!(f, "declined"),
            Self::ManualReview => write!(f, "manual_review"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Enriched => write!(f, "enriched"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl SubmissionStatus {
    /// Returns true if the status stops the chain when a stage sets it.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Declined | Self::Error)
    }

    /// Returns true if a human should look at the submission.
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::ManualReview | Self::Duplicate | Self::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(SubmissionStatus::Pending.to_string(), "pending");
        assert_eq!(SubmissionStatus::ManualReview.to_string(), "manual_review");
        assert_eq!(SubmissionStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_status_default() {
        assert_eq!(SubmissionStatus::default(), SubmissionStatus::Pending);
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(SubmissionStatus::Declined.is_terminal());
        assert!(SubmissionStatus::Error.is_terminal());
        assert!(!SubmissionStatus::ManualReview.is_terminal());
        assert!(!SubmissionStatus::Duplicate.is_terminal());
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&SubmissionStatus::ManualReview).unwrap();
        assert_eq!(json, r#""manual_review""#);

        let deserialized: SubmissionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, SubmissionStatus::ManualReview);
    }
}

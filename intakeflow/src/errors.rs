//! Error types for the intakeflow orchestration layer.
//!
//! Business outcomes (declined, manual review, duplicates, unavailable
//! enrichment) are never errors; they live on the [`SubmissionContext`].
//! The types here cover infrastructure failures and resource exhaustion.
//!
//! [`SubmissionContext`]: crate::core::SubmissionContext

use thiserror::Error;

use crate::resilience::{Classify, ErrorClass};

/// The main error type for intakeflow operations.
#[derive(Debug, Error)]
pub enum IntakeflowError {
    /// Waiting for a per-key idempotency lock exceeded the configured limit.
    #[error("Timed out after {waited_ms}ms waiting for idempotency lock on key {key}")]
    LockTimeout {
        /// The idempotency key whose lock could not be acquired.
        key: String,
        /// How long the caller waited, in milliseconds.
        waited_ms: u64,
    },

    /// A call was rejected because the dependency's breaker is open.
    #[error("Circuit breaker for '{dependency}' is open")]
    CircuitOpen {
        /// The protected dependency.
        dependency: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntakeflowError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if the error signals an exhausted caller-side limit.
    #[must_use]
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Failure of [`IdempotencyGate::process_once`].
///
/// [`IdempotencyGate::process_once`]: crate::idempotency::IdempotencyGate::process_once
#[derive(Debug, Error)]
pub enum GateError<E> {
    /// The per-key lock could not be acquired in time. Nothing was processed.
    #[error("Timed out after {waited_ms}ms waiting for idempotency lock on key {key}")]
    LockTimeout {
        /// The idempotency key.
        key: String,
        /// How long the caller waited, in milliseconds.
        waited_ms: u64,
    },

    /// The wrapped work failed. Nothing was stored.
    #[error("{0}")]
    Work(E),
}

impl<E> GateError<E> {
    /// Returns the work error, if this is one.
    pub fn into_work(self) -> Option<E> {
        match self {
            Self::Work(e) => Some(e),
            Self::LockTimeout { .. } => None,
        }
    }
}

/// Failure of a [`RetryingCall`].
///
/// `Failed` carries the original error of the last attempt, unwrapped, so
/// callers can match on the real failure kind.
///
/// [`RetryingCall`]: crate::resilience::RetryingCall
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError<E> {
    /// The breaker refused the attempt; the dependency was not called.
    #[error("Circuit breaker for '{dependency}' is open")]
    CircuitOpen {
        /// The protected dependency.
        dependency: String,
    },

    /// The dependency failed (terminally, or retriably with attempts exhausted).
    #[error("{0}")]
    Failed(E),
}

impl<E> CallError<E> {
    /// Returns true if the call was rejected by an open breaker.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns the original dependency error, if one was raised.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::CircuitOpen { .. } => None,
        }
    }
}

/// Failure of a risk API lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskApiError {
    /// Rate limiting or a server-side failure; worth retrying.
    #[error("Risk API server error{}: {message}", status_suffix(.status))]
    ServerTransient {
        /// HTTP status, when there was one.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// The request itself was rejected; retrying will not help.
    #[error("Risk API client error{}: {message}", status_suffix(.status))]
    ClientPermanent {
        /// HTTP status, when there was one.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// No response in time, or no connection at all.
    #[error("Risk API timeout: {message}")]
    Timeout {
        /// Description of the failure.
        message: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl RiskApiError {
    /// Maps an HTTP status to the matching error kind.
    ///
    /// 429 and 5xx are transient; every other status is permanent.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 || (500..600).contains(&status) {
            Self::ServerTransient {
                status: Some(status),
                message,
            }
        } else {
            Self::ClientPermanent {
                status: Some(status),
                message,
            }
        }
    }
}

impl Classify for RiskApiError {
    fn classify(&self) -> ErrorClass {
        match self {
            Self::ServerTransient { .. } | Self::Timeout { .. } => ErrorClass::Retriable,
            Self::ClientPermanent { .. } => ErrorClass::Terminal,
        }
    }
}

impl<E> From<CallError<E>> for IntakeflowError
where
    E: std::fmt::Display,
{
    fn from(err: CallError<E>) -> Self {
        match err {
            CallError::CircuitOpen { dependency } => Self::CircuitOpen { dependency },
            CallError::Failed(e) => Self::Internal(e.to_string()),
        }
    }
}

impl<E> From<GateError<E>> for IntakeflowError
where
    E: std::fmt::Display,
{
    fn from(err: GateError<E>) -> Self {
        match err {
            GateError::LockTimeout { key, waited_ms } => Self::LockTimeout { key, waited_ms },
            GateError::Work(e) => Self::Internal(e.to_string()),
        }
    }
}

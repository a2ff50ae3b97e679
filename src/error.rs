//! Error types shared across the resolution pipeline and admin operations.
//!
//! Backend call failures are typed so callers can decide between retrying,
//! dropping the call's contribution, or declining a fallback stage. Schema
//! administration returns [`SchemaFailure`] as a value rather than an error
//! path, so the caller can surface `reason` directly.

use serde::Serialize;
use thiserror::Error;

/// A failure of a single search-backend call.
///
/// Every variant is recoverable at the call site: retrieval drops the
/// call's contribution, fallback stages decline, and seeding retries
/// transient variants.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend could not be reached or returned an error status.
    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    /// The call exceeded the configured timeout.
    #[error("search backend timed out: {0}")]
    Timeout(String),

    /// The backend responded with a body we could not interpret.
    #[error("malformed search backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

/// Typed result of a failed schema setup or seed operation.
///
/// Serialized verbatim into admin responses as
/// `{ "reason": "...", "operation": "fail" | "error" }`.
#[derive(Debug, Clone, Serialize, Error)]
#[error("{reason}")]
pub struct SchemaFailure {
    /// Human-readable description, shown to the operator as-is.
    pub reason: String,
    /// How the operation ended.
    pub operation: FailureKind,
}

/// Failure classification carried by [`SchemaFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The operation itself failed (bad input, backend rejection).
    Fail,
    /// An unexpected error outside the operation's own steps.
    Error,
}

impl SchemaFailure {
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            operation: FailureKind::Fail,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            operation: FailureKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_serializes_lowercase() {
        let failure = SchemaFailure::fail("collection rejected");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["operation"], "fail");
        assert_eq!(json["reason"], "collection rejected");

        let failure = SchemaFailure::error("fetch exploded");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["operation"], "error");
    }

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Unavailable("503".into()).is_transient());
        assert!(BackendError::Timeout("15s".into()).is_transient());
        assert!(!BackendError::Malformed("bad json".into()).is_transient());
    }
}

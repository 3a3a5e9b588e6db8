//! Error types for coordinator operations.
//!
//! Protocol violations are local to the request that caused them: the
//! coordinator answers the offending request with one of these errors and
//! keeps serving everything else.

use crate::types::PromiseId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a computation did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum ComputationFailure {
    /// The computation returned an error.
    Error(String),
    /// The computation panicked.
    Panicked(String),
}

impl fmt::Display for ComputationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "computation failed: {}", msg),
            Self::Panicked(msg) => write!(f, "computation panicked: {}", msg),
        }
    }
}

/// Errors that can occur when talking to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// The promise identity is not (or no longer) in the table.
    UnknownPromise(PromiseId),

    /// A second result was reported for an already completed promise.
    DoubleCompletion(PromiseId),

    /// Release was requested for a promise that has not completed yet.
    PromiseStillPending(PromiseId),

    /// The awaited promise completed with a failure outcome.
    ComputationFailure {
        promise: PromiseId,
        reason: ComputationFailure,
    },

    /// The coordinator stopped before the request could be answered.
    CoordinatorClosed,
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPromise(id) => write!(f, "Unknown promise: {}", id),
            Self::DoubleCompletion(id) => write!(f, "Promise {} was already completed", id),
            Self::PromiseStillPending(id) => {
                write!(f, "Promise {} is still pending and cannot be released", id)
            }
            Self::ComputationFailure { promise, reason } => {
                write!(f, "Promise {}: {}", promise, reason)
            }
            Self::CoordinatorClosed => write!(f, "Coordinator is no longer running"),
        }
    }
}

impl std::error::Error for CoordinatorError {}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CoordinatorError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::CoordinatorClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for CoordinatorError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::CoordinatorClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let id = PromiseId::new(3);
        assert_eq!(
            CoordinatorError::UnknownPromise(id).to_string(),
            "Unknown promise: #3"
        );
        assert_eq!(
            CoordinatorError::DoubleCompletion(id).to_string(),
            "Promise #3 was already completed"
        );
        let failure = CoordinatorError::ComputationFailure {
            promise: id,
            reason: ComputationFailure::Panicked("boom".into()),
        };
        assert_eq!(failure.to_string(), "Promise #3: computation panicked: boom");
    }

    #[test]
    fn failure_serializes_tagged() {
        let json = serde_json::to_value(ComputationFailure::Error("bad input".into())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "error", "message": "bad input" })
        );
    }

    #[tokio::test]
    async fn closed_channels_map_to_coordinator_closed() {
        let (tx, rx) = tokio::sync::oneshot::channel::<u8>();
        drop(tx);
        let err: CoordinatorError = rx.await.unwrap_err().into();
        assert_eq!(err, CoordinatorError::CoordinatorClosed);
    }
}

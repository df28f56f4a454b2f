//! Relay error taxonomy.

use alloy::primitives::TxHash;
use serde::Serialize;
use thiserror::Error;

/// Everything a relay request can fail with.
///
/// Component-level variants (`FeeUnavailable` .. `NetworkError`) are seen by
/// the engine's retry loop; callers only ever receive terminal ones
/// (`PlanningFailed`, `RelayFailed`, `ConfirmationTimeout`, `Cancelled`) plus
/// `NotFound` from receipt lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RelayError {
    /// Fee query failed. Retryable.
    #[error("Fee data unavailable: {0}")]
    FeeUnavailable(String),

    /// The call would revert. The request is invalid.
    #[error("Gas estimation reverted: {0}")]
    EstimationReverted(String),

    /// Estimation hit a transient RPC failure. Retryable.
    #[error("Gas estimation unavailable: {0}")]
    EstimationUnavailable(String),

    /// Planning failed for good; the request never broadcasts.
    #[error("Planning failed: {0}")]
    PlanningFailed(Box<RelayError>),

    /// The computed max fee is above the configured ceiling.
    #[error("Max fee per gas {max_fee} exceeds configured cap {cap}")]
    FeeCapExceeded { max_fee: u128, cap: u128 },

    /// The chain refused the transaction. Retryable with a fee bump.
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// Transport failure while broadcasting. Retryable with the same plan.
    #[error("Network error during broadcast: {0}")]
    NetworkError(String),

    /// Every attempt was used up.
    #[error("Relay failed after {attempts} attempt(s): {reason}")]
    RelayFailed { attempts: u32, reason: String },

    /// The caller's deadline passed before inclusion. The chain may still
    /// include the transaction later.
    #[error("Transaction {tx_hash} not confirmed within {waited_ms}ms")]
    ConfirmationTimeout { tx_hash: TxHash, waited_ms: u64 },

    /// Unknown transaction hash.
    #[error("Receipt not found for {0}")]
    NotFound(TxHash),

    /// Cancelled by the caller before broadcast.
    #[error("Relay request cancelled")]
    Cancelled,

    /// Signing with the relayer identity failed.
    #[error("Identity error: {0}")]
    Identity(String),
}

impl RelayError {
    /// Whether the request-level retry loop may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::FeeUnavailable(_)
                | RelayError::EstimationUnavailable(_)
                | RelayError::Rejected(_)
                | RelayError::NetworkError(_)
        )
    }

    /// Wrap a non-retryable planning failure.
    pub fn planning_failed(cause: RelayError) -> Self {
        RelayError::PlanningFailed(Box::new(cause))
    }

    /// The innermost error, looking through `PlanningFailed`.
    pub fn root_cause(&self) -> &RelayError {
        match self {
            RelayError::PlanningFailed(cause) => cause.root_cause(),
            other => other,
        }
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(RelayError::FeeUnavailable("x".into()).is_retryable());
        assert!(RelayError::EstimationUnavailable("x".into()).is_retryable());
        assert!(RelayError::Rejected("fee too low".into()).is_retryable());
        assert!(RelayError::NetworkError("reset".into()).is_retryable());

        assert!(!RelayError::EstimationReverted("x".into()).is_retryable());
        assert!(!RelayError::Cancelled.is_retryable());
        assert!(!RelayError::RelayFailed {
            attempts: 3,
            reason: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_root_cause() {
        let err = RelayError::planning_failed(RelayError::EstimationReverted("bad".into()));
        assert_eq!(err.root_cause(), &RelayError::EstimationReverted("bad".into()));
        assert_eq!(
            err.to_string(),
            "Planning failed: Gas estimation reverted: bad"
        );
    }

    #[test]
    fn test_serializes_with_kind() {
        let json = serde_json::to_value(RelayError::Rejected("fee too low".into())).unwrap();
        assert_eq!(json["kind"], "rejected");
        assert_eq!(json["detail"], "fee too low");
    }
}

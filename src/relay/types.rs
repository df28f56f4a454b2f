//! Relay data model.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::types::ChainReceipt;
use crate::relay::error::RelayError;

/// Caller-supplied values that replace what the engine would compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeOverrides {
    /// Used as-is: no estimation, no safety buffer.
    pub gas_limit: Option<u64>,
    pub max_fee_per_unit: Option<u128>,
    pub max_priority_fee_per_unit: Option<u128>,
}

/// A caller's intent to have the relayer send a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub to: Address,
    pub data: Bytes,
    /// Native-currency amount in wei.
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub overrides: FeeOverrides,
}

impl RelayRequest {
    pub fn new(to: Address, data: Bytes, value: U256) -> Self {
        Self {
            to,
            data,
            value,
            overrides: FeeOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: FeeOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// A fully gas/fee-specified, not yet signed transaction.
///
/// Regenerated for every attempt. Holds `max_fee_per_unit >=
/// max_priority_fee_per_unit` and `gas_limit > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPlan {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: u64,
    pub max_fee_per_unit: u128,
    pub max_priority_fee_per_unit: u128,
    pub nonce: u64,
    pub attempt_number: u32,
}

impl TransactionPlan {
    /// Whether the plan satisfies the fee and gas invariants.
    pub fn is_well_formed(&self) -> bool {
        self.gas_limit > 0 && self.max_fee_per_unit >= self.max_priority_fee_per_unit
    }

    /// Upper bound on what the plan can cost: `gas_limit × max_fee + value`.
    pub fn max_cost(&self) -> U256 {
        U256::from(self.gas_limit) * U256::from(self.max_fee_per_unit) + self.value
    }
}

/// How one broadcast attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum AttemptResult {
    /// The node accepted the transaction.
    Broadcast,
    /// The node refused it.
    Rejected(String),
    /// Every same-plan rebroadcast hit a transport failure.
    NetworkError(String),
}

/// One plan and what happened when it was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayAttempt {
    pub attempt_number: u32,
    pub plan: TransactionPlan,
    /// Known before broadcast; identical across same-plan rebroadcasts.
    pub tx_hash: TxHash,
    /// Unix seconds of the first broadcast try.
    pub submitted_at: u64,
    /// Broadcast calls made for this plan (1 + network retries).
    pub broadcast_tries: u32,
    pub result: AttemptResult,
}

/// Execution status of an included transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Final record of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub effective_fee_per_unit: u128,
    pub status: ReceiptStatus,
    /// `gas_used × effective_fee_per_unit`.
    pub fee: U256,
}

impl TransactionReceipt {
    /// Classify a chain receipt. `None` if it has no block yet.
    pub fn from_chain(receipt: &ChainReceipt) -> Option<Self> {
        let block_number = receipt.block_number?;
        Some(Self {
            tx_hash: receipt.tx_hash,
            block_number,
            gas_used: receipt.gas_used,
            effective_fee_per_unit: receipt.effective_gas_price,
            status: if receipt.success {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Reverted
            },
            fee: U256::from(receipt.gas_used) * U256::from(receipt.effective_gas_price),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Externally visible lifecycle state of a relay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    /// Accepted; planning, broadcasting, or waiting for inclusion.
    Pending,
    /// Included on chain (successfully or reverted).
    Included,
    /// All attempts used up, or planning failed.
    RelayFailed,
    /// The caller's deadline passed before inclusion.
    ConfirmationTimeout,
    /// Cancelled; the engine stopped reporting this request.
    Abandoned,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayState::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::Pending => "pending",
            RelayState::Included => "included",
            RelayState::RelayFailed => "relay_failed",
            RelayState::ConfirmationTimeout => "confirmation_timeout",
            RelayState::Abandoned => "abandoned",
        }
    }
}

/// Point-in-time view of a request, as exposed by its handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayStatus {
    pub state: RelayState,
    /// Hash of the most recent broadcast, if any.
    pub tx_hash: Option<TxHash>,
    pub attempts: u32,
    pub receipt: Option<TransactionReceipt>,
}

impl RelayStatus {
    pub(crate) fn pending() -> Self {
        Self {
            state: RelayState::Pending,
            tx_hash: None,
            attempts: 0,
            receipt: None,
        }
    }
}

/// Terminal result of one relay request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayOutcome {
    pub request_id: Uuid,
    pub state: RelayState,
    /// Ordered attempt chain.
    pub attempts: Vec<RelayAttempt>,
    pub receipt: Option<TransactionReceipt>,
    pub error: Option<RelayError>,
}

impl RelayOutcome {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Fee actually paid, known only once included.
    pub fn fee_paid(&self) -> Option<U256> {
        self.receipt.as_ref().map(|r| r.fee)
    }

    /// Hash of the included transaction, else of the latest broadcast.
    pub fn tx_hash(&self) -> Option<TxHash> {
        self.receipt
            .as_ref()
            .map(|r| r.tx_hash)
            .or_else(|| self.attempts.last().map(|a| a.tx_hash))
    }
}

/// Pre-flight cost estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeEstimate {
    /// Raw simulated gas.
    pub gas_units: u64,
    /// Gas limit a plan would use (buffered).
    pub gas_limit: u64,
    pub max_fee_per_unit: u128,
    pub max_priority_fee_per_unit: u128,
    /// `gas_units × max_fee_per_unit`.
    pub fee_estimate_total: U256,
}

/// Relayer account summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayerStats {
    pub address: Address,
    pub balance: U256,
    /// Next nonce the sequencer will hand out.
    pub next_nonce: u64,
    /// Nonce the chain reports, including pending transactions.
    pub chain_nonce: u64,
    pub base_fee_per_unit: u128,
    pub suggested_priority_fee_per_unit: u128,
    pub inflight_requests: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_receipt(success: bool, block_number: Option<u64>) -> ChainReceipt {
        ChainReceipt {
            tx_hash: TxHash::with_last_byte(1),
            block_number,
            gas_used: 21_000,
            effective_gas_price: 11,
            success,
        }
    }

    #[test]
    fn test_receipt_fee_and_status() {
        let receipt = TransactionReceipt::from_chain(&chain_receipt(true, Some(100))).unwrap();
        assert_eq!(receipt.fee, U256::from(231_000u64));
        assert_eq!(receipt.status, ReceiptStatus::Success);

        let reverted = TransactionReceipt::from_chain(&chain_receipt(false, Some(100))).unwrap();
        assert_eq!(reverted.status, ReceiptStatus::Reverted);
        assert!(!reverted.is_success());
    }

    #[test]
    fn test_unmined_receipt_is_not_a_receipt() {
        assert!(TransactionReceipt::from_chain(&chain_receipt(true, None)).is_none());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: RelayRequest = serde_json::from_str(
            r#"{"to":"0x000000000000000000000000000000000000beef","data":"0x"}"#,
        )
        .unwrap();
        let beef: Address = "0x000000000000000000000000000000000000beef".parse().unwrap();
        assert_eq!(request.to, beef);
        assert_eq!(request.value, U256::ZERO);
        assert_eq!(request.overrides, FeeOverrides::default());
    }

    #[test]
    fn test_plan_invariants() {
        let mut plan = TransactionPlan {
            to: Address::ZERO,
            data: Bytes::new(),
            value: U256::from(5),
            gas_limit: 10,
            max_fee_per_unit: 3,
            max_priority_fee_per_unit: 1,
            nonce: 0,
            attempt_number: 1,
        };
        assert!(plan.is_well_formed());
        assert_eq!(plan.max_cost(), U256::from(35));

        plan.max_priority_fee_per_unit = 4;
        assert!(!plan.is_well_formed());
    }

    #[test]
    fn test_state_terminality() {
        assert!(!RelayState::Pending.is_terminal());
        assert!(RelayState::Included.is_terminal());
        assert!(RelayState::Abandoned.is_terminal());
        assert_eq!(RelayState::ConfirmationTimeout.as_str(), "confirmation_timeout");
    }
}

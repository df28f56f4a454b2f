//! Chain-level types and error definitions.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the chain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0:?}")]
    Timeout(Duration),

    /// The simulated call reverted.
    #[error("Execution reverted: {0}")]
    Reverted(String),

    /// The node refused the request (insufficient funds, fee too low, ...).
    #[error("Rejected by node: {0}")]
    Rejected(String),

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

impl ChainError {
    /// Transport-level failures that may succeed if simply repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Rpc(_) | ChainError::Timeout(_))
    }

    /// Whether a rejection means the node already holds this exact transaction.
    pub fn is_already_known(&self) -> bool {
        match self {
            ChainError::Rejected(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("already known") || msg.contains("already imported")
            }
            _ => false,
        }
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Fee levels reported by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainFees {
    /// Base fee of the latest block, in wei per gas.
    pub base_fee_per_gas: u128,
    /// Node-suggested priority fee, in wei per gas.
    pub max_priority_fee_per_gas: u128,
}

/// A call to simulate against current chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Receipt as reported by the chain, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub tx_hash: TxHash,
    /// `None` while the node knows the transaction but has not mined it.
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    /// Execution-success flag.
    pub success: bool,
}

/// A signed, EIP-2718 encoded transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx_hash: TxHash,
    pub raw: Bytes,
}

//! The chain-RPC seam the relay engine is written against.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;

use crate::chain::types::{CallRequest, ChainFees, ChainReceipt, ChainResult};

/// Read and broadcast operations the engine needs from a chain node.
///
/// Implementations classify node errors into [`ChainError`](crate::chain::ChainError)
/// variants: transport trouble as `Rpc`/`Timeout`, a reverting simulation as
/// `Reverted`, and a refused broadcast as `Rejected`.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Chain ID reported by the node.
    async fn chain_id(&self) -> ChainResult<u64>;

    /// Current base fee and suggested priority fee.
    async fn fee_data(&self) -> ChainResult<ChainFees>;

    /// Dry-run the call and return the gas it consumes.
    async fn estimate_gas(&self, call: &CallRequest) -> ChainResult<u64>;

    /// Transaction count for the address, including pending transactions.
    async fn transaction_count(&self, address: Address) -> ChainResult<u64>;

    /// Latest block number.
    async fn block_number(&self) -> ChainResult<u64>;

    /// Receipt for a transaction, `None` if not yet mined.
    async fn receipt(&self, tx_hash: TxHash) -> ChainResult<Option<ChainReceipt>>;

    /// Broadcast a signed, encoded transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<TxHash>;

    /// Native balance of the address.
    async fn balance(&self, address: Address) -> ChainResult<U256>;
}

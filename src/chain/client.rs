//! Chain RPC client with failover, timeouts and error classification.
//!
//! # Responsibilities
//! - Connect to the primary JSON-RPC endpoint and any failovers
//! - Query chain state (fees, nonces, block height, receipts, balances)
//! - Broadcast raw signed transactions
//! - Classify node errors so the relay engine can decide what is retryable

use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::{RpcError, TransportResult};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::chain::rpc::ChainRpc;
use crate::chain::types::{CallRequest, ChainError, ChainFees, ChainReceipt, ChainResult};
use crate::config::ChainConfig;
use crate::resilience::timeouts::with_timeout;

/// JSON-RPC error code geth and anvil use for `execution reverted`.
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Alloy-backed [`ChainRpc`] implementation with failover support.
#[derive(Clone)]
pub struct AlloyChainClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    /// Configuration.
    config: ChainConfig,
    /// Per-call timeout.
    timeout_duration: Duration,
}

impl AlloyChainClient {
    /// Create a new chain client.
    ///
    /// Fails only on an unparseable primary URL. A chain ID mismatch or an
    /// unreachable node is logged, not fatal.
    pub async fn new(config: ChainConfig) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(ProviderBuilder::new().connect_http(primary_url).erased());

        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => providers.push(ProviderBuilder::new().connect_http(url).erased()),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    failovers = client.providers.len() - 1,
                    "Chain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Chain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let actual = self.chain_id().await?;
        if actual != self.config.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Run `call` against each provider in order until one answers.
    ///
    /// A JSON-RPC error response is an answer: it is classified and returned
    /// without consulting the failovers.
    async fn with_failover<T, F, Fut>(&self, op: &'static str, call: F) -> ChainResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let mut last_error = ChainError::Rpc(format!("No RPC providers available for {op}"));

        for (i, provider) in self.providers.iter().enumerate() {
            match with_timeout(self.timeout_duration, call(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(RpcError::ErrorResp(payload))) => {
                    return Err(classify_error_response(payload.code, &payload.message));
                }
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider");
                    last_error = ChainError::Rpc(e.to_string());
                }
                Err(elapsed) => {
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider");
                    last_error = ChainError::Timeout(elapsed);
                }
            }
        }

        Err(last_error)
    }
}

/// Map a node's JSON-RPC error response onto the chain error taxonomy.
pub fn classify_error_response(code: i64, message: &str) -> ChainError {
    if code == EXECUTION_REVERTED_CODE || message.to_ascii_lowercase().contains("revert") {
        ChainError::Reverted(message.to_string())
    } else {
        ChainError::Rejected(message.to_string())
    }
}

#[async_trait]
impl ChainRpc for AlloyChainClient {
    async fn chain_id(&self) -> ChainResult<u64> {
        self.with_failover("chain_id", |p| async move { p.get_chain_id().await })
            .await
    }

    async fn fee_data(&self) -> ChainResult<ChainFees> {
        self.with_failover("fee_data", |p| async move {
            let block = p.get_block_by_number(BlockNumberOrTag::Latest).await?;
            let max_priority_fee_per_gas = p.get_max_priority_fee_per_gas().await?;
            let base_fee_per_gas = block
                .and_then(|b| b.header.base_fee_per_gas)
                .unwrap_or_default() as u128;
            Ok(ChainFees {
                base_fee_per_gas,
                max_priority_fee_per_gas,
            })
        })
        .await
    }

    async fn estimate_gas(&self, call: &CallRequest) -> ChainResult<u64> {
        self.with_failover("estimate_gas", |p| {
            let tx = TransactionRequest::default()
                .with_from(call.from)
                .with_to(call.to)
                .with_input(call.data.clone())
                .with_value(call.value);
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    async fn transaction_count(&self, address: Address) -> ChainResult<u64> {
        self.with_failover("transaction_count", |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
    }

    async fn block_number(&self) -> ChainResult<u64> {
        self.with_failover("block_number", |p| async move { p.get_block_number().await })
            .await
    }

    async fn receipt(&self, tx_hash: TxHash) -> ChainResult<Option<ChainReceipt>> {
        self.with_failover("receipt", |p| async move {
            let receipt = p.get_transaction_receipt(tx_hash).await?;
            Ok(receipt.map(|r| ChainReceipt {
                tx_hash: r.transaction_hash,
                block_number: r.block_number,
                gas_used: r.gas_used,
                effective_gas_price: r.effective_gas_price,
                success: r.status(),
            }))
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<TxHash> {
        self.with_failover("send_raw_transaction", |p| {
            let raw = raw.clone();
            async move {
                let pending = p.send_raw_transaction(&raw).await?;
                Ok(*pending.tx_hash())
            }
        })
        .await
    }

    async fn balance(&self, address: Address) -> ChainResult<U256> {
        self.with_failover("balance", |p| async move { p.get_balance(address).await })
            .await
    }
}

impl std::fmt::Debug for AlloyChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyChainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

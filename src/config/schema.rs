//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Chain RPC connection settings.
    pub chain: ChainConfig,

    /// Fee policy.
    pub fees: FeeConfig,

    /// Retry ceilings and back-off.
    pub retries: RetryConfig,

    /// Confirmation tracking.
    pub confirmation: ConfirmationConfig,

    /// Nonce sequencing.
    pub nonce: NonceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chain RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 10,
        }
    }
}

/// Fee policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Percentage both fee fields are raised by on each retry (minimum 10).
    pub escalation_percent: u32,

    /// Safety margin added to raw gas estimates.
    pub gas_limit_buffer_percent: u32,

    /// Base fee multiplier used for the initial `maxFeePerGas`.
    pub base_fee_multiplier: u32,

    /// Optional ceiling on `maxFeePerGas` in wei (protection against spikes).
    pub max_fee_per_gas_cap: Option<u64>,

    /// How long a fee snapshot may be reused, in milliseconds (0 = never).
    pub cache_ttl_ms: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            escalation_percent: 10,
            gas_limit_buffer_percent: 10,
            base_fee_multiplier: 2,
            max_fee_per_gas_cap: None,
            cache_ttl_ms: 0,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum fee-level attempts per request (distinct plans).
    pub max_attempts: u32,

    /// Same-plan rebroadcasts after a network error, per attempt.
    pub max_network_retries: u32,

    /// Local retries for transient fee and estimation reads.
    pub transient_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_network_retries: 2,
            transient_retries: 2,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

/// Confirmation tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Blocks (including the inclusion block) required before a receipt is final.
    pub confirmations: u64,

    /// Receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Permit polling faster than every 2 seconds (local devnets).
    pub allow_fast_polling: bool,

    /// Deadline applied when the caller supplies none. Unset = wait forever.
    pub default_deadline_secs: Option<u64>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            confirmations: 1,
            poll_interval_ms: 3000,
            allow_fast_polling: false,
            default_deadline_secs: None,
        }
    }
}

/// Nonce sequencing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NonceConfig {
    /// Allow several leases in flight at once. Off means strictly serial.
    pub concurrent: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

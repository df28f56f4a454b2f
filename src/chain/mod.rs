//! Chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment variable (private key)
//!     → identity.rs (key loading, EIP-1559 signing)
//! Configuration (RPC URLs, chain id, timeouts)
//!     → client.rs (alloy providers with failover + timeouts)
//!     → rpc.rs (ChainRpc trait the relay engine consumes)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod identity;
pub mod rpc;
pub mod types;

pub use client::AlloyChainClient;
pub use identity::RelayerIdentity;
pub use rpc::ChainRpc;
pub use types::{
    CallRequest, ChainError, ChainFees, ChainReceipt, ChainResult, SignedTransaction,
};

//! The relayer's signing identity.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSigner;
use alloy::primitives::{Address, TxKind};
use alloy::signers::local::PrivateKeySigner;
use std::sync::Arc;

use crate::chain::types::{ChainError, ChainResult, SignedTransaction};
use crate::relay::types::TransactionPlan;

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "RELAYER_PRIVATE_KEY";

/// Signing key and address of the single relayer account.
///
/// Cheap to clone; all clones share one signer. The engine never mutates the
/// account's balance or on-chain nonce directly.
#[derive(Clone)]
pub struct RelayerIdentity {
    signer: Arc<PrivateKeySigner>,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl RelayerIdentity {
    /// Create an identity from a hex-encoded private key string.
    ///
    /// Accepts the key with or without a `0x` prefix.
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> ChainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ChainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Relayer identity initialized"
        );

        Ok(Self {
            signer: Arc::new(signer),
            chain_id,
        })
    }

    /// Load the identity from `RELAYER_PRIVATE_KEY`.
    pub fn from_env(chain_id: u64) -> ChainResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            ChainError::Wallet(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    /// The relayer's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The chain ID this identity signs for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a plan as an EIP-1559 transaction.
    ///
    /// The returned hash is the hash the chain will report, so it is known
    /// before broadcast.
    pub async fn sign_plan(&self, plan: &TransactionPlan) -> ChainResult<SignedTransaction> {
        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce: plan.nonce,
            gas_limit: plan.gas_limit,
            max_fee_per_gas: plan.max_fee_per_unit,
            max_priority_fee_per_gas: plan.max_priority_fee_per_unit,
            to: TxKind::Call(plan.to),
            value: plan.value,
            input: plan.data.clone(),
            ..Default::default()
        };

        let signature = self
            .signer
            .sign_transaction(&mut tx)
            .await
            .map_err(|e| ChainError::Wallet(format!("Signing failed: {}", e)))?;

        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(SignedTransaction {
            tx_hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        })
    }
}

impl std::fmt::Debug for RelayerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerIdentity")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{keccak256, Bytes, U256};

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn plan(nonce: u64) -> TransactionPlan {
        TransactionPlan {
            to: Address::with_last_byte(0xef),
            data: Bytes::new(),
            value: U256::ZERO,
            gas_limit: 23_100,
            max_fee_per_unit: 21,
            max_priority_fee_per_unit: 1,
            nonce,
            attempt_number: 1,
        }
    }

    #[test]
    fn test_identity_from_private_key() {
        let identity = RelayerIdentity::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        assert_eq!(
            identity.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_identity_with_0x_prefix() {
        let identity =
            RelayerIdentity::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY), 1).unwrap();
        assert_eq!(
            identity.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = RelayerIdentity::from_private_key("invalid_key", 1);
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[test]
    fn test_debug_hides_key() {
        let identity = RelayerIdentity::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        let debug = format!("{:?}", identity);
        assert!(!debug.contains(TEST_PRIVATE_KEY));
    }

    #[tokio::test]
    async fn test_sign_plan_hash_matches_encoding() {
        let identity = RelayerIdentity::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let signed = identity.sign_plan(&plan(0)).await.unwrap();

        assert!(!signed.raw.is_empty());
        // EIP-1559 envelope type byte
        assert_eq!(signed.raw[0], 0x02);
        assert_eq!(signed.tx_hash, keccak256(&signed.raw));
    }

    #[tokio::test]
    async fn test_sign_plan_is_deterministic_per_plan() {
        let identity = RelayerIdentity::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let a = identity.sign_plan(&plan(7)).await.unwrap();
        let b = identity.sign_plan(&plan(7)).await.unwrap();
        let c = identity.sign_plan(&plan(8)).await.unwrap();

        assert_eq!(a.tx_hash, b.tx_hash);
        assert_ne!(a.tx_hash, c.tx_hash);
    }
}

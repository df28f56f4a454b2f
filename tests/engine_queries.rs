//! Read-only engine operations.

use alloy::primitives::{Bytes, U256};

use relay_engine::chain::ChainError;
use relay_engine::relay::RelayError;

mod common;
use common::{beef, engine, identity, test_config, MockChain, START_NONCE};

#[tokio::test]
async fn test_estimate_fee() {
    let chain = MockChain::new();
    let (engine, _clock) = engine(&chain, &test_config()).await;

    let estimate = engine
        .estimate_fee(beef(), Bytes::new(), U256::ZERO)
        .await
        .unwrap();

    assert_eq!(estimate.gas_units, 21_000);
    assert_eq!(estimate.gas_limit, 23_100);
    assert_eq!(estimate.max_priority_fee_per_unit, 1);
    assert_eq!(estimate.max_fee_per_unit, 21);
    assert_eq!(estimate.fee_estimate_total, U256::from(21_000u64 * 21));
    assert!(chain.broadcasts().is_empty());
}

#[tokio::test]
async fn test_estimate_fee_surfaces_revert() {
    let chain = MockChain::new();
    chain.set_estimate(Err(ChainError::Reverted("0x08c379a0".into())));
    let (engine, _clock) = engine(&chain, &test_config()).await;

    let err = engine
        .estimate_fee(beef(), Bytes::new(), U256::ZERO)
        .await
        .unwrap_err();
    assert_eq!(err, RelayError::EstimationReverted("0x08c379a0".into()));
}

#[tokio::test]
async fn test_estimate_fee_unavailable_after_local_retries() {
    let chain = MockChain::new();
    chain.fail_fee_queries((0..3).map(|_| ChainError::Rpc("connection refused".into())));
    let (engine, _clock) = engine(&chain, &test_config()).await;

    let err = engine
        .estimate_fee(beef(), Bytes::new(), U256::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::FeeUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_stats() {
    let chain = MockChain::new();
    chain.set_fees(30, 2);
    let (engine, _clock) = engine(&chain, &test_config()).await;

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.address, identity().address());
    assert_eq!(stats.next_nonce, START_NONCE);
    assert_eq!(stats.chain_nonce, START_NONCE);
    assert_eq!(stats.base_fee_per_unit, 30);
    assert_eq!(stats.suggested_priority_fee_per_unit, 2);
    assert_eq!(stats.inflight_requests, 0);
    assert!(stats.balance > U256::ZERO);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["next_nonce"], START_NONCE);
}

//! Signing and broadcasting.
//!
//! # Responsibilities
//! - Sign a plan with the relayer identity; the hash is known before broadcast
//! - Rebroadcast the same signed bytes on transport failure
//! - Classify the outcome as broadcast, rejected, or network error
//!
//! # Design Decisions
//! - Rebroadcasting identical bytes is idempotent on chain, so a transport
//!   error never risks two different transactions sharing a nonce
//! - A node saying it already holds the transaction counts as a broadcast

use alloy::primitives::TxHash;
use std::sync::Arc;

use crate::chain::identity::RelayerIdentity;
use crate::chain::rpc::ChainRpc;
use crate::chain::types::ChainError;
use crate::observability::metrics;
use crate::relay::clock::Clock;
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::types::{AttemptResult, RelayAttempt, TransactionPlan};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::retries::RetryPolicy;

/// What happened when one plan was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub tx_hash: TxHash,
    pub submitted_at: u64,
    pub broadcast_tries: u32,
    pub result: AttemptResult,
}

impl Submission {
    pub fn into_attempt(self, plan: TransactionPlan) -> RelayAttempt {
        RelayAttempt {
            attempt_number: plan.attempt_number,
            plan,
            tx_hash: self.tx_hash,
            submitted_at: self.submitted_at,
            broadcast_tries: self.broadcast_tries,
            result: self.result,
        }
    }
}

/// Signs plans and pushes them to the chain.
pub struct RelaySubmitter {
    rpc: Arc<dyn ChainRpc>,
    identity: RelayerIdentity,
    clock: Arc<dyn Clock>,
    max_network_retries: u32,
    backoff: RetryPolicy,
}

impl RelaySubmitter {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        identity: RelayerIdentity,
        clock: Arc<dyn Clock>,
        max_network_retries: u32,
        backoff: RetryPolicy,
    ) -> Self {
        Self {
            rpc,
            identity,
            clock,
            max_network_retries,
            backoff,
        }
    }

    /// Sign and broadcast `plan`.
    ///
    /// Only a signing failure is an `Err`; rejections and network errors are
    /// reported in the returned [`Submission`] so the attempt is still recorded.
    pub async fn submit(&self, plan: &TransactionPlan) -> RelayResult<Submission> {
        let signed = self
            .identity
            .sign_plan(plan)
            .await
            .map_err(|e| RelayError::Identity(e.to_string()))?;

        let submitted_at = self.clock.unix_time();
        let mut tries = 0;

        let result = loop {
            tries += 1;
            match self.rpc.send_raw_transaction(signed.raw.clone()).await {
                Ok(hash) => {
                    if hash != signed.tx_hash {
                        tracing::warn!(
                            expected = %signed.tx_hash,
                            reported = %hash,
                            "Node reported a different transaction hash"
                        );
                    }
                    break AttemptResult::Broadcast;
                }
                Err(e) if e.is_already_known() => {
                    tracing::info!(tx_hash = %signed.tx_hash, "Transaction already known to node");
                    break AttemptResult::Broadcast;
                }
                Err(e) if e.is_transient() => {
                    if tries > self.max_network_retries {
                        break AttemptResult::NetworkError(e.to_string());
                    }
                    metrics::record_network_retry();
                    let delay =
                        calculate_backoff(tries, self.backoff.base_delay_ms, self.backoff.max_delay_ms);
                    tracing::warn!(
                        tx_hash = %signed.tx_hash,
                        try_number = tries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Broadcast failed, resending same transaction"
                    );
                    self.clock.sleep(delay).await;
                }
                Err(ChainError::Rejected(reason)) | Err(ChainError::Reverted(reason)) => {
                    break AttemptResult::Rejected(reason);
                }
                Err(e) => break AttemptResult::Rejected(e.to_string()),
            }
        };

        match &result {
            AttemptResult::Broadcast => {
                metrics::record_attempt("broadcast");
                tracing::info!(
                    tx_hash = %signed.tx_hash,
                    nonce = plan.nonce,
                    attempt = plan.attempt_number,
                    tries,
                    "Transaction broadcast"
                );
            }
            AttemptResult::Rejected(reason) => {
                metrics::record_attempt("rejected");
                tracing::warn!(
                    tx_hash = %signed.tx_hash,
                    attempt = plan.attempt_number,
                    reason = %reason,
                    "Transaction rejected"
                );
            }
            AttemptResult::NetworkError(reason) => {
                metrics::record_attempt("network_error");
                tracing::warn!(
                    tx_hash = %signed.tx_hash,
                    attempt = plan.attempt_number,
                    tries,
                    reason = %reason,
                    "Broadcast failed on every try"
                );
            }
        }

        Ok(Submission {
            tx_hash: signed.tx_hash,
            submitted_at,
            broadcast_tries: tries,
            result,
        })
    }
}

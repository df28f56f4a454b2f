//! Confirmation tracking.
//!
//! # State Machine
//! ```text
//! Submitted ──poll──▶ Pending ──receipt──▶ Included (depth reached)
//!                        ▲                    │
//!                        └──receipt vanished──┘ (reorg while waiting for depth)
//!
//! Pending ──caller deadline──▶ TimedOut
//! ```
//!
//! The tracker only observes. It never re-issues an attempt; on timeout the
//! caller decides what to do next.

use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::rpc::ChainRpc;
use crate::observability::metrics;
use crate::relay::clock::Clock;
use crate::relay::types::TransactionReceipt;

/// How tracking of one retry chain ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Included at the required depth. May still be a reverted execution.
    Included(TransactionReceipt),
    /// The deadline passed first. `tx_hash` is the latest broadcast.
    TimedOut { tx_hash: TxHash, waited: Duration },
}

/// Polls for the receipt of any transaction in a retry chain.
pub struct ConfirmationTracker {
    rpc: Arc<dyn ChainRpc>,
    clock: Arc<dyn Clock>,
    confirmations: u64,
    poll_interval: Duration,
}

impl ConfirmationTracker {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        clock: Arc<dyn Clock>,
        confirmations: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rpc,
            clock,
            confirmations: confirmations.max(1),
            poll_interval,
        }
    }

    /// Poll until one of `tx_hashes` is included `confirmations` deep, or the
    /// deadline passes.
    ///
    /// Every hash is watched because any plan of the chain may be the one the
    /// chain includes. Later hashes are checked first.
    pub async fn track(&self, tx_hashes: &[TxHash], deadline: Option<Duration>) -> TrackOutcome {
        let started = self.clock.now();
        let latest = tx_hashes.last().copied().unwrap_or_default();
        let mut included: Option<TransactionReceipt> = None;

        loop {
            metrics::record_confirmation_poll();

            match self.find_receipt(tx_hashes).await {
                Ok(Some(receipt)) => {
                    if self.is_deep_enough(&receipt).await {
                        tracing::info!(
                            tx_hash = %receipt.tx_hash,
                            block = receipt.block_number,
                            status = ?receipt.status,
                            "Transaction confirmed"
                        );
                        return TrackOutcome::Included(receipt);
                    }
                    if included.is_none() {
                        tracing::info!(
                            tx_hash = %receipt.tx_hash,
                            block = receipt.block_number,
                            confirmations = self.confirmations,
                            "Transaction included, waiting for depth"
                        );
                    }
                    included = Some(receipt);
                }
                Ok(None) => {
                    if let Some(lost) = included.take() {
                        tracing::warn!(
                            tx_hash = %lost.tx_hash,
                            block = lost.block_number,
                            "Receipt disappeared, transaction back to pending"
                        );
                    }
                }
                // Unreachable node: keep whatever was seen last.
                Err(()) => {}
            }

            let waited = self.clock.now().saturating_sub(started);
            let mut pause = self.poll_interval;
            if let Some(deadline) = deadline {
                if waited >= deadline {
                    tracing::warn!(
                        tx_hash = %latest,
                        waited_ms = waited.as_millis() as u64,
                        "Confirmation deadline reached"
                    );
                    return TrackOutcome::TimedOut {
                        tx_hash: latest,
                        waited,
                    };
                }
                pause = pause.min(deadline - waited);
            }

            tracing::debug!(elapsed_ms = waited.as_millis() as u64, "Waiting for receipt");
            self.clock.sleep(pause).await;
        }
    }

    /// `Err` only when no receipt was found and some poll failed.
    async fn find_receipt(&self, tx_hashes: &[TxHash]) -> Result<Option<TransactionReceipt>, ()> {
        let mut failed = false;
        for tx_hash in tx_hashes.iter().rev() {
            match self.rpc.receipt(*tx_hash).await {
                Ok(Some(receipt)) => {
                    if let Some(receipt) = TransactionReceipt::from_chain(&receipt) {
                        return Ok(Some(receipt));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    failed = true;
                    tracing::debug!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                }
            }
        }
        if failed {
            Err(())
        } else {
            Ok(None)
        }
    }

    /// Depth counts the inclusion block itself.
    pub(crate) async fn is_deep_enough(&self, receipt: &TransactionReceipt) -> bool {
        if self.confirmations <= 1 {
            return true;
        }
        match self.rpc.block_number().await {
            Ok(head) => head.saturating_add(1) >= receipt.block_number.saturating_add(self.confirmations),
            Err(e) => {
                tracing::debug!(error = %e, "Block height poll failed");
                false
            }
        }
    }
}

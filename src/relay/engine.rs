//! The relay engine: the outbound surface and the per-request worker.
//!
//! # Request Lifecycle
//! ```text
//! submit_relay ──▶ spawn worker ──▶ RelayHandle (returned immediately)
//!
//! worker:
//!   begin chain   gas limit and nonce lease          (retryable errors back off)
//!   attempt loop  plan ─▶ sign ─▶ broadcast          (≤ max_attempts plans)
//!                   rejected / network error ─▶ back off, escalate fees
//!                   broadcast ─▶ commit nonce
//!   track         poll every hash of the chain until depth or deadline
//!   finish        store receipt, publish event, resolve handle
//! ```

use alloy::primitives::{Address, Bytes, TxHash, U256};
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::Instrument;
use uuid::Uuid;

use crate::chain::identity::RelayerIdentity;
use crate::chain::rpc::ChainRpc;
use crate::chain::types::ChainResult;
use crate::config::RelayConfig;
use crate::observability::metrics;
use crate::relay::clock::Clock;
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::events::{EventPublisher, RelayEvent};
use crate::relay::fees::{FeeOracle, FeePolicy};
use crate::relay::gas::{apply_gas_buffer, GasEstimator};
use crate::relay::handle::{self, HandleReporter, RelayHandle};
use crate::relay::nonce::{CommittedNonce, NonceMode, NonceSequencer};
use crate::relay::planner::{RetryChain, TransactionPlanner};
use crate::relay::submitter::RelaySubmitter;
use crate::relay::tracker::{ConfirmationTracker, TrackOutcome};
use crate::relay::types::{
    AttemptResult, FeeEstimate, FeeOverrides, RelayAttempt, RelayOutcome, RelayRequest,
    RelayState, RelayerStats, TransactionReceipt,
};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::retries::RetryPolicy;

/// Per-request options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOptions {
    /// How long to wait for inclusion after the first broadcast. `None` falls
    /// back to the configured default, which is no deadline.
    pub deadline: Option<Duration>,
}

/// Relays transactions through one signing identity.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct RelayEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    rpc: Arc<dyn ChainRpc>,
    identity: RelayerIdentity,
    clock: Arc<dyn Clock>,
    fees: Arc<FeeOracle>,
    gas: Arc<GasEstimator>,
    nonces: Arc<NonceSequencer>,
    planner: TransactionPlanner,
    submitter: RelaySubmitter,
    tracker: ConfirmationTracker,
    receipts: DashMap<TxHash, TransactionReceipt>,
    /// Hashes whose retry chain is still being tracked.
    tracked: DashSet<TxHash>,
    events: EventPublisher,
    inflight: AtomicUsize,
    policy: FeePolicy,
    gas_buffer_percent: u32,
    max_attempts: u32,
    backoff: RetryPolicy,
    default_deadline: Option<Duration>,
}

impl RelayEngine {
    /// Build the engine, reading the starting nonce from the chain.
    pub async fn new(
        config: &RelayConfig,
        rpc: Arc<dyn ChainRpc>,
        identity: RelayerIdentity,
        clock: Arc<dyn Clock>,
    ) -> ChainResult<Self> {
        let nonces = NonceSequencer::from_chain(
            rpc.as_ref(),
            identity.address(),
            NonceMode::from(&config.nonce),
        )
        .await?;
        Ok(Self::with_sequencer(config, rpc, identity, clock, nonces))
    }

    /// Build the engine around an existing nonce sequencer.
    pub fn with_sequencer(
        config: &RelayConfig,
        rpc: Arc<dyn ChainRpc>,
        identity: RelayerIdentity,
        clock: Arc<dyn Clock>,
        nonces: NonceSequencer,
    ) -> Self {
        let transient = RetryPolicy::from(&config.retries);
        let policy = FeePolicy::from(&config.fees);
        let nonces = Arc::new(nonces);

        let fees = Arc::new(FeeOracle::new(
            rpc.clone(),
            clock.clone(),
            transient,
            Duration::from_millis(config.fees.cache_ttl_ms),
        ));
        let gas = Arc::new(GasEstimator::new(
            rpc.clone(),
            clock.clone(),
            transient,
            identity.address(),
        ));
        let planner = TransactionPlanner::new(
            fees.clone(),
            gas.clone(),
            nonces.clone(),
            policy,
            config.fees.gas_limit_buffer_percent,
        );
        let submitter = RelaySubmitter::new(
            rpc.clone(),
            identity.clone(),
            clock.clone(),
            config.retries.max_network_retries,
            transient,
        );
        let tracker = ConfirmationTracker::new(
            rpc.clone(),
            clock.clone(),
            config.confirmation.confirmations,
            Duration::from_millis(config.confirmation.poll_interval_ms),
        );

        tracing::info!(
            address = %identity.address(),
            chain_id = identity.chain_id(),
            next_nonce = nonces.next_nonce(),
            nonce_mode = ?nonces.mode(),
            max_attempts = config.retries.max_attempts,
            confirmations = config.confirmation.confirmations,
            "Relay engine ready"
        );

        Self {
            inner: Arc::new(EngineInner {
                rpc,
                identity,
                clock,
                fees,
                gas,
                nonces,
                planner,
                submitter,
                tracker,
                receipts: DashMap::new(),
                tracked: DashSet::new(),
                events: EventPublisher::default(),
                inflight: AtomicUsize::new(0),
                policy,
                gas_buffer_percent: config.fees.gas_limit_buffer_percent,
                max_attempts: config.retries.max_attempts.max(1),
                backoff: transient,
                default_deadline: config
                    .confirmation
                    .default_deadline_secs
                    .map(Duration::from_secs),
            }),
        }
    }

    /// The relayer's address.
    pub fn address(&self) -> Address {
        self.inner.identity.address()
    }

    /// Accept a request and relay it in the background.
    pub fn submit_relay(&self, request: RelayRequest) -> RelayHandle {
        self.submit_relay_with(request, RelayOptions::default())
    }

    /// Like [`submit_relay`](Self::submit_relay), with a confirmation deadline.
    pub fn submit_relay_with(&self, request: RelayRequest, options: RelayOptions) -> RelayHandle {
        let id = Uuid::new_v4();
        let (handle, reporter) = handle::channel(id);
        let deadline = options.deadline.or(self.inner.default_deadline);

        tracing::info!(
            request_id = %id,
            to = %request.to,
            value = %request.value,
            data_len = request.data.len(),
            "Relay request accepted"
        );
        self.inner.inflight.fetch_add(1, Ordering::Relaxed);
        metrics::inflight_started();
        self.inner.events.publish(RelayEvent::Accepted { request_id: id });

        let inner = self.inner.clone();
        let span = tracing::info_span!("relay", request_id = %id);
        tokio::spawn(async move { inner.run(request, deadline, reporter).await }.instrument(span));

        handle
    }

    /// Receipt for a transaction hash.
    ///
    /// Served from the receipt store; unknown hashes get one chain lookup.
    /// A chain receipt is stored only once it has the configured depth and no
    /// live request is still tracking the hash, so later lookups return the
    /// same receipt. Anything shallower is returned as the chain reports it.
    pub async fn get_receipt(&self, tx_hash: TxHash) -> RelayResult<TransactionReceipt> {
        if let Some(receipt) = self.inner.receipts.get(&tx_hash) {
            return Ok(receipt.value().clone());
        }

        let receipt = match self.inner.rpc.receipt(tx_hash).await {
            Ok(Some(receipt)) => {
                TransactionReceipt::from_chain(&receipt).ok_or(RelayError::NotFound(tx_hash))?
            }
            Ok(None) => return Err(RelayError::NotFound(tx_hash)),
            Err(e) => return Err(RelayError::NetworkError(e.to_string())),
        };

        if self.inner.tracked.contains(&tx_hash) {
            tracing::debug!(tx_hash = %tx_hash, "Receipt still tracked, not stored");
            return Ok(receipt);
        }
        if !self.inner.tracker.is_deep_enough(&receipt).await {
            tracing::debug!(
                tx_hash = %tx_hash,
                block = receipt.block_number,
                "Receipt below confirmation depth, not stored"
            );
            return Ok(receipt);
        }
        Ok(self.inner.store_receipt(receipt))
    }

    /// Pre-flight cost of a call, without submitting anything.
    pub async fn estimate_fee(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> RelayResult<FeeEstimate> {
        let gas_units = self.inner.gas.estimate(to, &data, value).await?;
        let snapshot = self.inner.fees.current_fees().await?;
        let fees = self
            .inner
            .policy
            .initial(&snapshot, &FeeOverrides::default());

        Ok(FeeEstimate {
            gas_units,
            gas_limit: apply_gas_buffer(gas_units, self.inner.gas_buffer_percent),
            max_fee_per_unit: fees.max_fee_per_unit,
            max_priority_fee_per_unit: fees.max_priority_fee_per_unit,
            fee_estimate_total: U256::from(gas_units) * U256::from(fees.max_fee_per_unit),
        })
    }

    /// Relayer account summary.
    pub async fn stats(&self) -> RelayResult<RelayerStats> {
        let address = self.address();
        let balance = self
            .inner
            .rpc
            .balance(address)
            .await
            .map_err(|e| RelayError::NetworkError(e.to_string()))?;
        let chain_nonce = self
            .inner
            .rpc
            .transaction_count(address)
            .await
            .map_err(|e| RelayError::NetworkError(e.to_string()))?;
        let fees = self.inner.fees.current_fees().await?;

        Ok(RelayerStats {
            address,
            balance,
            next_nonce: self.inner.nonces.next_nonce(),
            chain_nonce,
            base_fee_per_unit: fees.base_fee_per_unit,
            suggested_priority_fee_per_unit: fees.suggested_priority_fee_per_unit,
            inflight_requests: self.inflight_requests(),
        })
    }

    /// Requests accepted but not yet terminal.
    pub fn inflight_requests(&self) -> usize {
        self.inner.inflight.load(Ordering::Relaxed)
    }

    /// Receive state-change events for every request.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.inner.events.subscribe()
    }
}

/// Resolves when the caller cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl EngineInner {
    async fn run(&self, request: RelayRequest, deadline: Option<Duration>, reporter: HandleReporter) {
        let id = reporter.id();
        let mut attempts = Vec::new();

        let outcome = match self.broadcast(request, &mut attempts, &reporter).await {
            Ok(committed) => self.confirm(committed, attempts, deadline, &reporter).await,
            Err(error) => {
                let state = if error == RelayError::Cancelled {
                    tracing::info!(attempts = attempts.len(), "Relay request cancelled");
                    RelayState::Abandoned
                } else {
                    tracing::warn!(attempts = attempts.len(), error = %error, "Relay request failed");
                    RelayState::RelayFailed
                };
                RelayOutcome {
                    request_id: id,
                    state,
                    attempts,
                    receipt: None,
                    error: Some(error),
                }
            }
        };

        for attempt in &outcome.attempts {
            self.tracked.remove(&attempt.tx_hash);
        }

        metrics::record_request(outcome.state.as_str());
        self.events.publish(RelayEvent::Finished {
            request_id: id,
            state: outcome.state,
            attempts: outcome.attempt_count(),
        });
        if !reporter.finish(outcome) {
            tracing::debug!("Outcome not delivered, caller already detached");
        }

        self.inflight.fetch_sub(1, Ordering::Relaxed);
        metrics::inflight_finished();
    }

    /// Plan and broadcast until one attempt reaches the network.
    ///
    /// On success the nonce is committed; on every failure path it is
    /// abandoned.
    async fn broadcast(
        &self,
        request: RelayRequest,
        attempts: &mut Vec<RelayAttempt>,
        reporter: &HandleReporter,
    ) -> RelayResult<CommittedNonce> {
        let mut chain = self.begin(request, reporter).await?;
        let mut cancel = reporter.cancellation();
        let mut last_error: Option<RelayError> = None;

        for try_number in 1..=self.max_attempts {
            if try_number > 1 {
                self.pause(try_number - 1, &mut cancel).await;
            }
            if reporter.is_cancelled() {
                chain.abandon();
                return Err(RelayError::Cancelled);
            }

            let plan = match self.planner.plan(&mut chain).await {
                Ok(plan) => plan,
                Err(e) if e.is_retryable() => {
                    tracing::warn!(try_number, error = %e, "Planning failed, will retry");
                    last_error = Some(e);
                    continue;
                }
                Err(e) => {
                    chain.abandon();
                    return Err(RelayError::planning_failed(e));
                }
            };

            if reporter.is_cancelled() {
                chain.abandon();
                return Err(RelayError::Cancelled);
            }

            let submission = match self.submitter.submit(&plan).await {
                Ok(submission) => submission,
                Err(e) => {
                    chain.abandon();
                    return Err(RelayError::RelayFailed {
                        attempts: attempts.len() as u32,
                        reason: e.to_string(),
                    });
                }
            };

            let attempt = submission.into_attempt(plan);
            self.tracked.insert(attempt.tx_hash);
            self.announce(reporter.id(), &attempt);
            let result = attempt.result.clone();
            attempts.push(attempt);
            reporter.progress(attempts);

            match result {
                AttemptResult::Broadcast => return Ok(chain.commit()),
                AttemptResult::Rejected(reason) => last_error = Some(RelayError::Rejected(reason)),
                AttemptResult::NetworkError(reason) => {
                    last_error = Some(RelayError::NetworkError(reason))
                }
            }
        }

        chain.abandon();
        Err(RelayError::RelayFailed {
            attempts: attempts.len() as u32,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }

    /// Fix the gas limit and lease a nonce, retrying transient failures.
    async fn begin(&self, request: RelayRequest, reporter: &HandleReporter) -> RelayResult<RetryChain> {
        let mut cancel = reporter.cancellation();
        let mut try_number = 0;

        loop {
            try_number += 1;
            if try_number > 1 {
                self.pause(try_number - 1, &mut cancel).await;
            }
            if reporter.is_cancelled() {
                return Err(RelayError::Cancelled);
            }

            let begun = tokio::select! {
                begun = self.planner.begin(request.clone()) => begun,
                _ = cancelled(&mut cancel) => Err(RelayError::Cancelled),
            };

            match begun {
                Ok(chain) => return Ok(chain),
                Err(RelayError::Cancelled) => return Err(RelayError::Cancelled),
                Err(e) if e.is_retryable() && try_number < self.max_attempts => {
                    tracing::warn!(try_number, error = %e, "Planning failed, will retry");
                }
                Err(e) if e.is_retryable() => {
                    return Err(RelayError::RelayFailed {
                        attempts: 0,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(RelayError::planning_failed(e)),
            }
        }
    }

    /// Back off before retry `retry`; returns early on cancellation.
    async fn pause(&self, retry: u32, cancel: &mut watch::Receiver<bool>) {
        let delay = calculate_backoff(retry, self.backoff.base_delay_ms, self.backoff.max_delay_ms);
        tokio::select! {
            _ = self.clock.sleep(delay) => {}
            _ = cancelled(cancel) => {}
        }
    }

    /// Track the broadcast chain to a terminal state.
    ///
    /// A cancel here only detaches the caller; tracking runs to the end so the
    /// receipt is still stored and published.
    async fn confirm(
        &self,
        committed: CommittedNonce,
        attempts: Vec<RelayAttempt>,
        deadline: Option<Duration>,
        reporter: &HandleReporter,
    ) -> RelayOutcome {
        let id = reporter.id();
        let mut tx_hashes: Vec<TxHash> = Vec::with_capacity(attempts.len());
        for attempt in &attempts {
            if !tx_hashes.contains(&attempt.tx_hash) {
                tx_hashes.push(attempt.tx_hash);
            }
        }

        let mut cancel = reporter.cancellation();
        let tracking = self.tracker.track(&tx_hashes, deadline);
        tokio::pin!(tracking);

        let tracked = tokio::select! {
            tracked = &mut tracking => tracked,
            _ = cancelled(&mut cancel) => {
                tracing::info!(nonce = committed.nonce(), "Caller detached, tracking continues");
                reporter.finish(RelayOutcome {
                    request_id: id,
                    state: RelayState::Abandoned,
                    attempts: attempts.clone(),
                    receipt: None,
                    error: Some(RelayError::Cancelled),
                });
                tracking.await
            }
        };
        drop(committed);

        match tracked {
            TrackOutcome::Included(receipt) => {
                self.receipts.insert(receipt.tx_hash, receipt.clone());
                metrics::record_fee_paid(receipt.gas_used as f64 * receipt.effective_fee_per_unit as f64);
                self.events.publish(RelayEvent::Included {
                    request_id: id,
                    receipt: receipt.clone(),
                });
                RelayOutcome {
                    request_id: id,
                    state: RelayState::Included,
                    attempts,
                    receipt: Some(receipt),
                    error: None,
                }
            }
            TrackOutcome::TimedOut { tx_hash, waited } => RelayOutcome {
                request_id: id,
                state: RelayState::ConfirmationTimeout,
                attempts,
                receipt: None,
                error: Some(RelayError::ConfirmationTimeout {
                    tx_hash,
                    waited_ms: waited.as_millis() as u64,
                }),
            },
        }
    }

    fn announce(&self, request_id: Uuid, attempt: &RelayAttempt) {
        let event = match &attempt.result {
            AttemptResult::Broadcast => RelayEvent::Broadcast {
                request_id,
                attempt_number: attempt.attempt_number,
                nonce: attempt.plan.nonce,
                tx_hash: attempt.tx_hash,
            },
            AttemptResult::Rejected(reason) | AttemptResult::NetworkError(reason) => {
                RelayEvent::AttemptFailed {
                    request_id,
                    attempt_number: attempt.attempt_number,
                    reason: reason.clone(),
                }
            }
        };
        self.events.publish(event);
    }

    /// Stores a chain lookup result; the first stored receipt for a hash wins.
    ///
    /// Receipts from the tracker bypass this and overwrite.
    fn store_receipt(&self, receipt: TransactionReceipt) -> TransactionReceipt {
        self.receipts
            .entry(receipt.tx_hash)
            .or_insert(receipt)
            .value()
            .clone()
    }
}

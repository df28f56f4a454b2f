//! Transaction planning.
//!
//! # Responsibilities
//! - Turn a request into a signable plan: gas limit, fees, nonce
//! - Keep one nonce and one gas limit for the whole retry chain of a request
//! - Escalate fees on every retry
//!
//! # Design Decisions
//! - In concurrent nonce mode gas is estimated before a nonce is leased, so a
//!   reverting request never touches the sequencer
//! - In serial nonce mode gas is estimated after the lease, once the previous
//!   request has settled; a revert abandons the lease, which rewinds the
//!   sequencer
//! - Fees are read per attempt; the cap is checked per attempt

use std::sync::Arc;

use crate::relay::error::RelayResult;
use crate::relay::fees::{FeeFields, FeeOracle, FeePolicy};
use crate::relay::gas::{apply_gas_buffer, GasEstimator};
use crate::relay::nonce::{CommittedNonce, NonceLease, NonceMode, NonceSequencer};
use crate::relay::types::{RelayRequest, TransactionPlan};

/// Everything that stays fixed across the attempts of one request.
#[derive(Debug)]
pub struct RetryChain {
    request: RelayRequest,
    gas_limit: u64,
    lease: NonceLease,
    last_plan: Option<TransactionPlan>,
}

impl RetryChain {
    pub fn nonce(&self) -> u64 {
        self.lease.nonce()
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Plans built so far.
    pub fn attempts(&self) -> u32 {
        self.last_plan.as_ref().map_or(0, |p| p.attempt_number)
    }

    /// A plan from this chain reached the network.
    pub fn commit(self) -> CommittedNonce {
        self.lease.commit()
    }

    /// No plan from this chain reached the network.
    pub fn abandon(self) {
        tracing::info!(
            nonce = self.lease.nonce(),
            attempts = self.attempts(),
            "Retry chain abandoned"
        );
        self.lease.abandon();
    }
}

/// Builds plans from the fee oracle, gas estimator and nonce sequencer.
pub struct TransactionPlanner {
    fees: Arc<FeeOracle>,
    gas: Arc<GasEstimator>,
    nonces: Arc<NonceSequencer>,
    policy: FeePolicy,
    gas_buffer_percent: u32,
}

impl TransactionPlanner {
    pub fn new(
        fees: Arc<FeeOracle>,
        gas: Arc<GasEstimator>,
        nonces: Arc<NonceSequencer>,
        policy: FeePolicy,
        gas_buffer_percent: u32,
    ) -> Self {
        Self {
            fees,
            gas,
            nonces,
            policy,
            gas_buffer_percent,
        }
    }

    /// Gas limit for a request: the explicit override, or the buffered estimate.
    pub async fn gas_limit_for(&self, request: &RelayRequest) -> RelayResult<u64> {
        if let Some(limit) = request.overrides.gas_limit.filter(|l| *l > 0) {
            return Ok(limit);
        }
        let raw = self
            .gas
            .estimate(request.to, &request.data, request.value)
            .await?;
        Ok(apply_gas_buffer(raw, self.gas_buffer_percent))
    }

    /// Start a retry chain: fix the gas limit and lease a nonce.
    ///
    /// In serial nonce mode this waits for the previous request to settle
    /// before estimating.
    pub async fn begin(&self, request: RelayRequest) -> RelayResult<RetryChain> {
        let (gas_limit, lease) = match self.nonces.mode() {
            NonceMode::Concurrent => {
                let gas_limit = self.gas_limit_for(&request).await?;
                (gas_limit, self.nonces.lease().await)
            }
            NonceMode::Serial => {
                let lease = self.nonces.lease().await;
                match self.gas_limit_for(&request).await {
                    Ok(gas_limit) => (gas_limit, lease),
                    Err(e) => {
                        lease.abandon();
                        return Err(e);
                    }
                }
            }
        };

        tracing::debug!(nonce = lease.nonce(), gas_limit, "Retry chain started");

        Ok(RetryChain {
            request,
            gas_limit,
            lease,
            last_plan: None,
        })
    }

    /// Build the chain's next plan.
    ///
    /// The first plan uses oracle fees (or the request's overrides); each
    /// later plan escalates from the previous one.
    pub async fn plan(&self, chain: &mut RetryChain) -> RelayResult<TransactionPlan> {
        let snapshot = self.fees.current_fees().await?;
        let fees = match &chain.last_plan {
            None => self.policy.initial(&snapshot, &chain.request.overrides),
            Some(previous) => self.policy.escalate(FeeFields::from(previous), &snapshot),
        };
        self.policy.check_cap(&fees)?;

        let plan = TransactionPlan {
            to: chain.request.to,
            data: chain.request.data.clone(),
            value: chain.request.value,
            gas_limit: chain.gas_limit,
            max_fee_per_unit: fees.max_fee_per_unit,
            max_priority_fee_per_unit: fees.max_priority_fee_per_unit,
            nonce: chain.nonce(),
            attempt_number: chain.attempts() + 1,
        };

        tracing::info!(
            attempt = plan.attempt_number,
            nonce = plan.nonce,
            gas_limit = plan.gas_limit,
            max_fee = plan.max_fee_per_unit,
            priority_fee = plan.max_priority_fee_per_unit,
            "Plan built"
        );

        chain.last_plan = Some(plan.clone());
        Ok(plan)
    }
}

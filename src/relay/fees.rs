//! Fee oracle and fee policy.
//!
//! # Responsibilities
//! - Read current base fee and suggested priority fee from the chain
//! - Derive first-attempt fees (oracle suggestion or caller overrides)
//! - Escalate fees on retry: both fields up by at least `escalation_percent`,
//!   never below what the oracle currently suggests

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::chain::rpc::ChainRpc;
use crate::config::FeeConfig;
use crate::relay::clock::Clock;
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::types::{FeeOverrides, TransactionPlan};
use crate::resilience::retries::{retry_transient, RetryPolicy};

/// Network fee levels at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSnapshot {
    pub base_fee_per_unit: u128,
    pub suggested_priority_fee_per_unit: u128,
}

/// The two fee fields of an EIP-1559 plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeFields {
    pub max_fee_per_unit: u128,
    pub max_priority_fee_per_unit: u128,
}

impl From<&TransactionPlan> for FeeFields {
    fn from(plan: &TransactionPlan) -> Self {
        Self {
            max_fee_per_unit: plan.max_fee_per_unit,
            max_priority_fee_per_unit: plan.max_priority_fee_per_unit,
        }
    }
}

/// Raise `value` by `percent`, rounding up so small values still move.
pub fn bump(value: u128, percent: u32) -> u128 {
    value
        .saturating_mul(100 + percent as u128)
        .saturating_add(99)
        / 100
}

/// Pure fee arithmetic, configured once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub base_fee_multiplier: u32,
    pub escalation_percent: u32,
    pub max_fee_cap: Option<u128>,
}

impl From<&FeeConfig> for FeePolicy {
    fn from(config: &FeeConfig) -> Self {
        Self {
            base_fee_multiplier: config.base_fee_multiplier,
            escalation_percent: config.escalation_percent,
            max_fee_cap: config.max_fee_per_gas_cap.map(u128::from),
        }
    }
}

impl FeePolicy {
    /// What the oracle's numbers suggest: `base × multiplier + priority`.
    pub fn suggested(&self, snapshot: &FeeSnapshot) -> FeeFields {
        let priority = snapshot.suggested_priority_fee_per_unit;
        FeeFields {
            max_fee_per_unit: snapshot
                .base_fee_per_unit
                .saturating_mul(self.base_fee_multiplier as u128)
                .saturating_add(priority),
            max_priority_fee_per_unit: priority,
        }
    }

    /// Fees for a first attempt. Overrides win over the oracle.
    pub fn initial(&self, snapshot: &FeeSnapshot, overrides: &FeeOverrides) -> FeeFields {
        let suggested = self.suggested(snapshot);
        let priority = overrides
            .max_priority_fee_per_unit
            .unwrap_or(suggested.max_priority_fee_per_unit);
        let max_fee = overrides
            .max_fee_per_unit
            .unwrap_or_else(|| suggested.max_fee_per_unit.max(priority));

        FeeFields {
            max_fee_per_unit: max_fee,
            max_priority_fee_per_unit: priority.min(max_fee),
        }
    }

    /// Fees for a retry of a plan that used `previous`.
    pub fn escalate(&self, previous: FeeFields, snapshot: &FeeSnapshot) -> FeeFields {
        let suggested = self.suggested(snapshot);
        let priority = bump(previous.max_priority_fee_per_unit, self.escalation_percent)
            .max(suggested.max_priority_fee_per_unit);
        let max_fee = bump(previous.max_fee_per_unit, self.escalation_percent)
            .max(suggested.max_fee_per_unit)
            .max(priority);

        FeeFields {
            max_fee_per_unit: max_fee,
            max_priority_fee_per_unit: priority,
        }
    }

    /// Refuse fees above the configured ceiling.
    pub fn check_cap(&self, fees: &FeeFields) -> RelayResult<()> {
        match self.max_fee_cap {
            Some(cap) if fees.max_fee_per_unit > cap => Err(RelayError::FeeCapExceeded {
                max_fee: fees.max_fee_per_unit,
                cap,
            }),
            _ => Ok(()),
        }
    }
}

/// Reads current network fees.
///
/// Each call queries the chain unless a snapshot younger than `cache_ttl`
/// exists; there is no other freshness guarantee.
pub struct FeeOracle {
    rpc: Arc<dyn ChainRpc>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    cache_ttl: Duration,
    last: Mutex<Option<(FeeSnapshot, Duration)>>,
}

impl FeeOracle {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            rpc,
            clock,
            retry,
            cache_ttl,
            last: Mutex::new(None),
        }
    }

    /// Current fees, retrying transient failures locally.
    ///
    /// Fails with `FeeUnavailable`, which callers treat as retryable.
    pub async fn current_fees(&self) -> RelayResult<FeeSnapshot> {
        if let Some(snapshot) = self.cached() {
            return Ok(snapshot);
        }

        let rpc: &dyn ChainRpc = self.rpc.as_ref();
        let fees = retry_transient(&self.retry, self.clock.as_ref(), "fee_data", move || {
            rpc.fee_data()
        })
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Fee query failed");
            RelayError::FeeUnavailable(e.to_string())
        })?;

        let snapshot = FeeSnapshot {
            base_fee_per_unit: fees.base_fee_per_gas,
            suggested_priority_fee_per_unit: fees.max_priority_fee_per_gas,
        };
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((snapshot, self.clock.now()));

        tracing::debug!(
            base_fee = snapshot.base_fee_per_unit,
            priority_fee = snapshot.suggested_priority_fee_per_unit,
            "Fee snapshot"
        );
        Ok(snapshot)
    }

    fn cached(&self) -> Option<FeeSnapshot> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let last = *self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        last.filter(|(_, taken_at)| now.saturating_sub(*taken_at) < self.cache_ttl)
            .map(|(snapshot, _)| snapshot)
    }
}

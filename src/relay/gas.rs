//! Gas estimation.

use alloy::primitives::{Address, Bytes, U256};
use std::sync::Arc;

use crate::chain::rpc::ChainRpc;
use crate::chain::types::{CallRequest, ChainError};
use crate::relay::clock::Clock;
use crate::relay::error::{RelayError, RelayResult};
use crate::resilience::retries::{retry_transient, RetryPolicy};

/// Add a `percent` safety margin to a raw estimate, rounding up.
pub fn apply_gas_buffer(raw: u64, percent: u32) -> u64 {
    let buffered = (raw as u128 * (100 + percent as u128)).div_ceil(100);
    u64::try_from(buffered).unwrap_or(u64::MAX)
}

/// Dry-runs calls from the relayer's address to bound their gas cost.
pub struct GasEstimator {
    rpc: Arc<dyn ChainRpc>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    from: Address,
}

impl GasEstimator {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        from: Address,
    ) -> Self {
        Self {
            rpc,
            clock,
            retry,
            from,
        }
    }

    /// Raw gas units the call consumes against current state.
    ///
    /// A reverting call (or a node refusing the simulation) is
    /// `EstimationReverted`; transport trouble that outlasts the local retries
    /// is `EstimationUnavailable`.
    pub async fn estimate(&self, to: Address, data: &Bytes, value: U256) -> RelayResult<u64> {
        let call = CallRequest {
            from: self.from,
            to,
            data: data.clone(),
            value,
        };

        let rpc: &dyn ChainRpc = self.rpc.as_ref();
        let call = &call;
        let result = retry_transient(&self.retry, self.clock.as_ref(), "estimate_gas", move || {
            rpc.estimate_gas(call)
        })
        .await;

        match result {
            Ok(gas) => {
                tracing::debug!(to = %to, gas, "Gas estimated");
                Ok(gas)
            }
            Err(ChainError::Reverted(reason)) | Err(ChainError::Rejected(reason)) => {
                tracing::info!(to = %to, reason = %reason, "Gas estimation reverted");
                Err(RelayError::EstimationReverted(reason))
            }
            Err(e) => {
                tracing::warn!(to = %to, error = %e, "Gas estimation unavailable");
                Err(RelayError::EstimationUnavailable(e.to_string()))
            }
        }
    }
}

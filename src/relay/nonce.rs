//! Nonce sequencing for the single relayer identity.
//!
//! # Responsibilities
//! - Hand out nonces in order with no gaps and no duplicates
//! - Take a nonce back when its retry chain never broadcast
//! - In serial mode, allow only one unconfirmed nonce at a time
//!
//! # Design Decisions
//! - `next` is read from the chain once at startup and tracked locally after
//!   that; the chain's pending count lags locally issued transactions
//! - The only critical section in the engine is the short mutex here; the
//!   serial-mode wait is an async semaphore, so waiting never blocks a thread
//! - An abandoned nonce is handed out again before any fresh one, so a failed
//!   request never leaves a hole that stalls later transactions
//! - The reissued nonce may go to a new, unrelated request rather than back to
//!   the chain that gave it up; the alternative is a gap the relayer can never
//!   fill. Only a chain that never broadcast gives up its nonce, so the new
//!   owner cannot collide with anything already on the network

use alloy::primitives::Address;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::chain::rpc::ChainRpc;
use crate::chain::types::ChainResult;
use crate::config::NonceConfig;
use crate::observability::metrics;

/// How many leases may be unconfirmed at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NonceMode {
    /// One at a time: the next lease waits until the previous request is
    /// confirmed, timed out, or abandoned.
    #[default]
    Serial,
    /// Any number; ordering still strict.
    Concurrent,
}

impl From<&NonceConfig> for NonceMode {
    fn from(config: &NonceConfig) -> Self {
        if config.concurrent {
            NonceMode::Concurrent
        } else {
            NonceMode::Serial
        }
    }
}

#[derive(Debug)]
struct NonceState {
    next: u64,
    released: BTreeSet<u64>,
    outstanding: usize,
}

impl NonceState {
    fn take(&mut self) -> u64 {
        self.outstanding += 1;
        match self.released.pop_first() {
            Some(nonce) => nonce,
            None => {
                let nonce = self.next;
                self.next += 1;
                nonce
            }
        }
    }

    fn settle(&mut self, nonce: u64, abandoned: bool) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if !abandoned {
            return;
        }
        self.released.insert(nonce);
        // Fold trailing released nonces back into `next`.
        while let Some(&last) = self.released.last() {
            if last + 1 != self.next {
                break;
            }
            self.released.pop_last();
            self.next -= 1;
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<NonceState>,
}

impl Shared {
    fn settle(&self, nonce: u64, abandoned: bool) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .settle(nonce, abandoned);
    }
}

/// Serializes nonce allocation for the relayer.
#[derive(Debug)]
pub struct NonceSequencer {
    shared: Arc<Shared>,
    serial: Option<Arc<Semaphore>>,
    mode: NonceMode,
}

impl NonceSequencer {
    pub fn new(start: u64, mode: NonceMode) -> Self {
        tracing::info!(start_nonce = start, ?mode, "Nonce sequencer initialized");
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(NonceState {
                    next: start,
                    released: BTreeSet::new(),
                    outstanding: 0,
                }),
            }),
            serial: match mode {
                NonceMode::Serial => Some(Arc::new(Semaphore::new(1))),
                NonceMode::Concurrent => None,
            },
            mode,
        }
    }

    /// Start from the chain's transaction count for `address`, pending included.
    pub async fn from_chain(
        rpc: &dyn ChainRpc,
        address: Address,
        mode: NonceMode,
    ) -> ChainResult<Self> {
        let start = rpc.transaction_count(address).await?;
        Ok(Self::new(start, mode))
    }

    pub fn mode(&self) -> NonceMode {
        self.mode
    }

    /// Wait until a nonce is assignable and take it.
    pub async fn lease(&self) -> NonceLease {
        let permit = match &self.serial {
            // The semaphore is never closed.
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };

        let nonce = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        metrics::record_nonce("lease");
        tracing::debug!(nonce, "Nonce leased");

        NonceLease {
            nonce,
            shared: self.shared.clone(),
            permit,
            settled: false,
        }
    }

    /// The lease's nonce was broadcast; it is spent.
    pub fn commit(&self, lease: NonceLease) -> CommittedNonce {
        lease.commit()
    }

    /// The lease's nonce was never broadcast; make it available again.
    pub fn abandon(&self, lease: NonceLease) {
        lease.abandon()
    }

    /// The nonce the next lease would get.
    pub fn next_nonce(&self) -> u64 {
        let state = self.shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.released.first().copied().unwrap_or(state.next)
    }

    /// Leases not yet committed or abandoned.
    pub fn outstanding(&self) -> usize {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .outstanding
    }
}

/// An exclusively held nonce.
///
/// Dropping a lease without settling it abandons the nonce.
#[derive(Debug)]
pub struct NonceLease {
    nonce: u64,
    shared: Arc<Shared>,
    permit: Option<OwnedSemaphorePermit>,
    settled: bool,
}

impl NonceLease {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Mark the nonce spent. In serial mode the returned value keeps the
    /// sequencer closed to new leases until it is dropped.
    pub fn commit(mut self) -> CommittedNonce {
        self.settled = true;
        self.shared.settle(self.nonce, false);
        metrics::record_nonce("commit");
        tracing::debug!(nonce = self.nonce, "Nonce committed");
        CommittedNonce {
            nonce: self.nonce,
            _permit: self.permit.take(),
        }
    }

    /// Give the nonce back.
    pub fn abandon(mut self) {
        self.settled = true;
        self.release();
    }

    fn release(&self) {
        self.shared.settle(self.nonce, true);
        metrics::record_nonce("abandon");
        tracing::debug!(nonce = self.nonce, "Nonce abandoned");
    }
}

impl Drop for NonceLease {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(nonce = self.nonce, "Nonce lease dropped unsettled, abandoning");
            self.release();
        }
    }
}

/// A spent nonce whose transaction is still being tracked.
#[derive(Debug)]
pub struct CommittedNonce {
    nonce: u64,
    _permit: Option<OwnedSemaphorePermit>,
}

impl CommittedNonce {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_serial_mode_waits_for_previous() {
        let sequencer = NonceSequencer::new(7, NonceMode::Serial);

        let first = sequencer.lease().await;
        assert_eq!(first.nonce(), 7);
        let committed = sequencer.commit(first);

        let blocked = tokio::time::timeout(Duration::from_millis(50), sequencer.lease()).await;
        assert!(blocked.is_err());

        drop(committed);
        let second = sequencer.lease().await;
        assert_eq!(second.nonce(), 8);
        let _ = sequencer.commit(second);
    }

    #[tokio::test]
    async fn test_concurrent_leases_are_contiguous() {
        let sequencer = Arc::new(NonceSequencer::new(100, NonceMode::Concurrent));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let sequencer = sequencer.clone();
            tasks.push(tokio::spawn(async move {
                let lease = sequencer.lease().await;
                tokio::task::yield_now().await;
                sequencer.commit(lease).nonce()
            }));
        }

        let mut nonces = Vec::new();
        for task in tasks {
            nonces.push(task.await.unwrap());
        }
        nonces.sort_unstable();

        assert_eq!(nonces, (100..132).collect::<Vec<_>>());
        assert_eq!(sequencer.next_nonce(), 132);
        assert_eq!(sequencer.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_nonce_is_reused_first() {
        let sequencer = NonceSequencer::new(5, NonceMode::Concurrent);
        let a = sequencer.lease().await;
        let b = sequencer.lease().await;
        let c = sequencer.lease().await;
        assert_eq!((a.nonce(), b.nonce(), c.nonce()), (5, 6, 7));

        sequencer.abandon(b);
        assert_eq!(sequencer.next_nonce(), 6);

        let reused = sequencer.lease().await;
        assert_eq!(reused.nonce(), 6);
        let fresh = sequencer.lease().await;
        assert_eq!(fresh.nonce(), 8);

        let _ = (a.commit(), c.commit(), reused.commit(), fresh.commit());
    }

    #[tokio::test]
    async fn test_abandoning_tail_rewinds() {
        let sequencer = NonceSequencer::new(0, NonceMode::Concurrent);
        let a = sequencer.lease().await;
        let b = sequencer.lease().await;

        sequencer.abandon(a);
        sequencer.abandon(b);

        assert_eq!(sequencer.next_nonce(), 0);
        assert_eq!(sequencer.lease().await.commit().nonce(), 0);
    }

    #[tokio::test]
    async fn test_dropped_lease_is_abandoned() {
        let sequencer = NonceSequencer::new(3, NonceMode::Serial);
        {
            let lease = sequencer.lease().await;
            assert_eq!(lease.nonce(), 3);
        }
        assert_eq!(sequencer.outstanding(), 0);

        let again = sequencer.lease().await;
        assert_eq!(again.nonce(), 3);
    }
}

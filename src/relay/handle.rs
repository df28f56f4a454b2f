//! Caller-side view of one relay request.

use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::relay::error::RelayError;
use crate::relay::types::{
    AttemptResult, RelayAttempt, RelayOutcome, RelayState, RelayStatus,
};

/// Returned by `submit_relay` right away; resolves as the request progresses.
#[derive(Debug)]
pub struct RelayHandle {
    id: Uuid,
    status: watch::Receiver<RelayStatus>,
    outcome: watch::Receiver<Option<RelayOutcome>>,
    cancel: Arc<watch::Sender<bool>>,
}

impl RelayHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current status.
    pub fn status(&self) -> RelayStatus {
        self.status.borrow().clone()
    }

    /// Wait for the next status change and return it.
    ///
    /// Returns the current status immediately once the request is terminal.
    pub async fn changed(&mut self) -> RelayStatus {
        if !self.status.borrow().state.is_terminal() {
            // Err: the engine side is gone and nothing else will change.
            let _ = self.status.changed().await;
        }
        self.status.borrow_and_update().clone()
    }

    /// Wait for the terminal outcome.
    pub async fn wait(mut self) -> RelayOutcome {
        let id = self.id;
        match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or_else(|| lost(id)),
            Err(_) => lost(id),
        }
    }

    /// Stop the request.
    ///
    /// Before broadcast this abandons the request and frees its nonce. After
    /// broadcast the chain effect cannot be undone: the handle resolves as
    /// `Abandoned` while the engine keeps tracking the transaction, so its
    /// receipt still reaches `get_receipt` and event subscribers.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

fn lost(id: Uuid) -> RelayOutcome {
    RelayOutcome {
        request_id: id,
        state: RelayState::RelayFailed,
        attempts: Vec::new(),
        receipt: None,
        error: Some(RelayError::RelayFailed {
            attempts: 0,
            reason: "relay task ended without an outcome".to_string(),
        }),
    }
}

/// Engine-side counterpart of a [`RelayHandle`].
///
/// The first terminal report wins; later ones are ignored.
#[derive(Debug)]
pub(crate) struct HandleReporter {
    id: Uuid,
    status: watch::Sender<RelayStatus>,
    outcome: watch::Sender<Option<RelayOutcome>>,
    cancel: Arc<watch::Sender<bool>>,
}

pub(crate) fn channel(id: Uuid) -> (RelayHandle, HandleReporter) {
    let (status_tx, status_rx) = watch::channel(RelayStatus::pending());
    let (outcome_tx, outcome_rx) = watch::channel(None);
    let (cancel_tx, _) = watch::channel(false);
    let cancel = Arc::new(cancel_tx);

    (
        RelayHandle {
            id,
            status: status_rx,
            outcome: outcome_rx,
            cancel: cancel.clone(),
        },
        HandleReporter {
            id,
            status: status_tx,
            outcome: outcome_tx,
            cancel,
        },
    )
}

impl HandleReporter {
    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// A receiver that flips to `true` when the caller cancels.
    pub(crate) fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Record progress of a still-pending request.
    pub(crate) fn progress(&self, attempts: &[RelayAttempt]) {
        let tx_hash = attempts
            .iter()
            .rev()
            .find(|a| a.result == AttemptResult::Broadcast)
            .map(|a| a.tx_hash);
        self.status.send_if_modified(|status| {
            if status.state.is_terminal() {
                return false;
            }
            status.attempts = attempts.len() as u32;
            status.tx_hash = tx_hash.or(status.tx_hash);
            true
        });
    }

    /// Deliver the terminal outcome. Returns false if one was already delivered.
    pub(crate) fn finish(&self, outcome: RelayOutcome) -> bool {
        let status = RelayStatus {
            state: outcome.state,
            tx_hash: outcome.tx_hash(),
            attempts: outcome.attempt_count(),
            receipt: outcome.receipt.clone(),
        };

        let delivered = self.outcome.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        });
        if delivered {
            self.status.send_replace(status);
        }
        delivered
    }
}

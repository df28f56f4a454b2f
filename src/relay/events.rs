//! One-way relay notifications for dashboards and indexers.
//!
//! Publishing never waits: with no subscriber, or a subscriber that fell
//! behind, events are dropped for that subscriber.

use alloy::primitives::TxHash;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::relay::types::{RelayState, TransactionReceipt};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// State changes of relay requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayEvent {
    Accepted {
        request_id: Uuid,
    },
    Broadcast {
        request_id: Uuid,
        attempt_number: u32,
        nonce: u64,
        tx_hash: TxHash,
    },
    AttemptFailed {
        request_id: Uuid,
        attempt_number: u32,
        reason: String,
    },
    Included {
        request_id: Uuid,
        receipt: TransactionReceipt,
    },
    Finished {
        request_id: Uuid,
        state: RelayState,
        attempts: u32,
    },
}

impl RelayEvent {
    pub fn request_id(&self) -> Uuid {
        match self {
            RelayEvent::Accepted { request_id }
            | RelayEvent::Broadcast { request_id, .. }
            | RelayEvent::AttemptFailed { request_id, .. }
            | RelayEvent::Included { request_id, .. }
            | RelayEvent::Finished { request_id, .. } => *request_id,
        }
    }
}

/// Fan-out of [`RelayEvent`]s.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<RelayEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: RelayEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

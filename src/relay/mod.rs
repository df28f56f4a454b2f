//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! RelayRequest
//!     → engine.rs (accept, spawn worker, hand back RelayHandle)
//!     → planner.rs (RetryChain: gas limit + nonce lease, then one plan per attempt)
//!         ├── gas.rs    (dry run, +10% buffer)
//!         ├── nonce.rs  (the only critical section)
//!         └── fees.rs   (oracle snapshot, initial / escalated fees)
//!     → submitter.rs (sign with RelayerIdentity, broadcast, same-plan resend)
//!     → tracker.rs (poll receipts of the whole chain to depth or deadline)
//!     → RelayOutcome (handle.rs) + RelayEvent (events.rs) + receipt store
//! ```
//!
//! # Design Decisions
//! - One worker task per request; requests only meet at the nonce sequencer
//! - Attempts of one request are strictly ordered
//! - Time is injected (clock.rs) so retry chains and deadlines test without timers

pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod fees;
pub mod gas;
pub mod handle;
pub mod nonce;
pub mod planner;
pub mod submitter;
pub mod tracker;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{RelayEngine, RelayOptions};
pub use error::{RelayError, RelayResult};
pub use events::{EventPublisher, RelayEvent};
pub use fees::{FeeOracle, FeePolicy, FeeSnapshot};
pub use gas::GasEstimator;
pub use handle::RelayHandle;
pub use nonce::{NonceLease, NonceMode, NonceSequencer};
pub use planner::{RetryChain, TransactionPlanner};
pub use submitter::{RelaySubmitter, Submission};
pub use tracker::{ConfirmationTracker, TrackOutcome};
pub use types::{
    AttemptResult, FeeEstimate, FeeOverrides, RelayAttempt, RelayOutcome, RelayRequest,
    RelayState, RelayStatus, RelayerStats, ReceiptStatus, TransactionPlan, TransactionReceipt,
};

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Chain read (fee query, gas estimation):
//!     → timeouts.rs (every RPC call has a deadline)
//!     → On transient failure: retries.rs (retry locally with backoff)
//!     → backoff.rs (exponential delay with jitter)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Only transient transport failures are retried locally
//! - Request-level retries (fee escalation) belong to the relay engine, not here

pub mod backoff;
pub mod retries;
pub mod timeouts;

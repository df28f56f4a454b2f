//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! relay engine, planner, submitter, tracker, nonce sequencer:
//!     → tracing events (structured fields, one per state transition)
//!     → metrics.rs (counters, gauges, histograms via the `metrics` facade)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, filtered by RUST_LOG / config)
//!     → Prometheus exporter (scrape endpoint, opt-in)
//! ```
//!
//! # Design Decisions
//! - Recording is always on; without an installed exporter the `metrics`
//!   macros are no-ops
//! - Private keys and raw call data are never logged

pub mod logging;
pub mod metrics;

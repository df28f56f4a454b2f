//! Transaction relay engine.
//!
//! Accepts outbound transaction intents, plans gas and fees, signs them with
//! a single relayer identity, retries with fee escalation, and tracks them to
//! inclusion.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                      RELAY ENGINE                        │
//!                 │                                                          │
//!  RelayRequest   │  ┌──────────┐   ┌───────────┐   ┌───────────┐            │
//!  ───────────────┼─▶│ engine   │──▶│  planner  │──▶│ submitter │──┐         │
//!                 │  └────┬─────┘   └─────┬─────┘   └───────────┘  │         │
//!  RelayHandle    │       │        ┌──────┼──────┐                 ▼         │
//!  ◀──────────────┼───────┤        ▼      ▼      ▼          ┌───────────┐    │
//!                 │       │      fees    gas   nonce        │  tracker  │    │
//!  RelayEvent     │       │                                 └─────┬─────┘    │
//!  ◀──────────────┼───────┴──────────── receipts ◀────────────────┘          │
//!                 │                                                          │
//!                 │  ┌────────────────────────────────────────────────────┐  │
//!                 │  │ chain (ChainRpc, alloy client, identity)           │  │
//!                 │  │ config · observability · resilience                │  │
//!                 │  └────────────────────────────────────────────────────┘  │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod chain;
pub mod relay;

// Cross-cutting concerns
pub mod config;
pub mod observability;
pub mod resilience;

pub use chain::{AlloyChainClient, ChainRpc, RelayerIdentity};
pub use config::schema::RelayConfig;
pub use relay::{RelayEngine, RelayError, RelayHandle, RelayOptions, RelayRequest};

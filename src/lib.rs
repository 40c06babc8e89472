//! Wallet workers - on-demand wallet provisioning
//!
//! A wallet request arrives on the `request.wallet` queue; a relay worker
//! creates a new wallet, looks up the current chain height, replies to the
//! requester with the address and forwards a scan job to `scan.wallet`.
//!
//! ## Components
//!
//! - **Broker**: the public and private AMQP connections of a worker
//! - **Wallet**: address generation and the chain height lookup
//! - **Relay**: the per-message protocol and the consuming worker
//! - **Supervisor**: the per-CPU worker pool and the top-level orchestrator

pub mod broker;
pub mod config;
pub mod logging;
pub mod relay;
pub mod supervisor;
pub mod types;
pub mod wallet;

pub use config::{CreatorArgs, OrchestratorArgs, RelayConfig};
pub use types::{RelayError, Result};

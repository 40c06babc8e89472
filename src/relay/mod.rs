//! Wallet request relay
//!
//! A relay worker consumes wallet requests, creates a wallet for each one,
//! replies to the requester with the new address and forwards a scan job to
//! the wallet scanner. Each message ends either acknowledged (reply and scan
//! job both published) or rejected for redelivery.
//!
//! ```text
//! request.wallet --> [create wallet + height] --> reply (replyTo, correlationId)
//!                                              \-> scan.wallet (persistent)
//!                                              \-> ack | nack
//! ```

pub mod messages;
pub mod protocol;
pub mod worker;

pub use messages::{CreationRequest, ScanRequest};
pub use protocol::{InboundMessage, Outcome, RelayContext};
pub use worker::{dispatch, DispatchStats, RelayWorker};

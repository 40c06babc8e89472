//! Per-message relay protocol
//!
//! ```text
//! Received -> Creating -> Replying & Forwarding -> Finalized(Ack)
//!          \-> Failed ------------------------------> Finalized(Nack)
//! ```
//!
//! A message is acknowledged only after both the reply and the scan job were
//! published. Any failure before that point rejects the message so the broker
//! redelivers it. Reply and forward go to different brokers with no
//! transaction between them: a failed forward after a successful reply leaves
//! the requester with an address whose scan job is retried on redelivery
//! under a new address.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::messages::{CreationRequest, ScanRequest};
use crate::broker::{Acknowledger, RelayChannels};
use crate::types::{RelayError, Result};
use crate::wallet::WalletCreationService;

/// A consumed request together with the handle that finalizes it
pub struct InboundMessage<A> {
    pub request: CreationRequest,
    pub acker: A,
}

impl<A> InboundMessage<A> {
    pub fn new(request: CreationRequest, acker: A) -> Self {
        Self { request, acker }
    }
}

/// How a message was finalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Reply and scan job published, message acknowledged
    Acked { address: String },
    /// Reply and scan job published, but the broker did not take the ack;
    /// the message will be redelivered if the channel is gone
    AckFailed { address: String },
    /// Message rejected for redelivery
    Nacked { reason: String },
}

impl Outcome {
    pub fn is_acked(&self) -> bool {
        matches!(self, Self::Acked { .. })
    }
}

/// Everything one worker needs to relay messages
pub struct RelayContext {
    worker_id: u64,
    service: WalletCreationService,
    channels: Arc<dyn RelayChannels>,
}

impl RelayContext {
    pub fn new(
        worker_id: u64,
        service: WalletCreationService,
        channels: Arc<dyn RelayChannels>,
    ) -> Self {
        Self {
            worker_id,
            service,
            channels,
        }
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    /// Run the protocol for one delivery.
    ///
    /// `None` stands for an empty delivery and is ignored. Every message is
    /// finalized exactly once: acked on success, nacked otherwise. A failed
    /// ack is reported as such and never followed by a nack.
    pub async fn handle<A: Acknowledger>(&self, message: Option<InboundMessage<A>>) -> Option<Outcome> {
        let Some(InboundMessage { request, acker }) = message else {
            debug!(worker = self.worker_id, "Ignoring empty delivery");
            return None;
        };

        let outcome = match self.relay(&request).await {
            Ok(address) => match acker.ack().await {
                Ok(()) => Outcome::Acked { address },
                Err(e) => {
                    warn!(
                        worker = self.worker_id,
                        correlation_id = request.correlation(),
                        "Failed to ack request: {}",
                        e
                    );
                    Outcome::AckFailed { address }
                }
            },
            Err(e) => {
                error!(
                    worker = self.worker_id,
                    correlation_id = request.correlation(),
                    "Worker #{}: Could not create new wallet [{}]",
                    self.worker_id,
                    e
                );
                if let Err(e) = acker.nack().await {
                    error!(
                        worker = self.worker_id,
                        correlation_id = request.correlation(),
                        "Failed to nack request: {}",
                        e
                    );
                }
                Outcome::Nacked {
                    reason: e.to_string(),
                }
            }
        };

        Some(outcome)
    }

    /// Create, reply and forward. Returns the new address.
    async fn relay(&self, request: &CreationRequest) -> Result<String> {
        let reply_to = request
            .reply_to
            .as_deref()
            .ok_or_else(|| RelayError::Payload("Request has no reply-to queue".into()))?;
        let payload = request.parse_payload()?;

        let created = self.service.create().await?;
        let address = created.wallet.address.clone();

        info!(
            worker = self.worker_id,
            correlation_id = request.correlation(),
            "Worker #{}: Created new wallet {} at height {} for {}",
            self.worker_id,
            address,
            created.height,
            request.correlation()
        );

        self.channels
            .reply(reply_to, request.correlation_id.as_deref(), address.as_bytes())
            .await?;

        let scan = ScanRequest::new(created.wallet, created.height, payload);
        self.channels.forward(&scan.to_bytes()?).await?;

        Ok(address)
    }
}

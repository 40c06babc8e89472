//! Broker access for relay workers
//!
//! A relay worker talks to two brokers: the public one it consumes wallet
//! requests from (and replies on), and the private one it forwards scan jobs
//! to. The relay protocol only sees the two traits below, so it can be driven
//! by the AMQP channels in production and by in-memory fakes in tests.

pub mod amqp;
pub mod connection;

pub use amqp::{
    into_request, reply_properties, request_from_parts, scan_properties, AmqpAcker, AmqpChannels,
};
pub use connection::{BrokerEndpoint, ConnectionManager, AMQP_SCHEME};

use async_trait::async_trait;

use crate::types::Result;

/// Publishing side of the relay: replies to requesters and scan forwards
#[async_trait]
pub trait RelayChannels: Send + Sync {
    /// Publish `body` to the requester's reply queue on the inbound channel,
    /// echoing the request's correlation id.
    async fn reply(&self, reply_to: &str, correlation_id: Option<&str>, body: &[u8]) -> Result<()>;

    /// Publish a serialized scan request to the scan queue on the outbound
    /// channel as a persistent message.
    async fn forward(&self, body: &[u8]) -> Result<()>;
}

/// Finalization of one consumed message
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Positive acknowledgment; the broker forgets the message
    async fn ack(&self) -> Result<()>;

    /// Negative acknowledgment; the broker redelivers the message
    async fn nack(&self) -> Result<()>;
}

//! AMQP implementations of the relay broker traits

use async_trait::async_trait;
use lapin::acker::Acker;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions, BasicPublishOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::{BasicProperties, Channel};

use super::{Acknowledger, RelayChannels};
use crate::relay::CreationRequest;
use crate::types::{RelayError, Result};

/// AMQP delivery mode for messages the broker writes to disk
const PERSISTENT: u8 = 2;

/// Publishes directly to queues through the default exchange
#[derive(Clone)]
pub struct AmqpChannels {
    inbound: Channel,
    outbound: Channel,
    scan_queue: String,
}

impl AmqpChannels {
    pub fn new(inbound: Channel, outbound: Channel, scan_queue: impl Into<String>) -> Self {
        Self {
            inbound,
            outbound,
            scan_queue: scan_queue.into(),
        }
    }
}

/// Properties of a reply: the request's correlation id, if it had one
pub fn reply_properties(correlation_id: Option<&str>) -> BasicProperties {
    let properties = BasicProperties::default();
    match correlation_id {
        Some(id) => properties.with_correlation_id(id.into()),
        None => properties,
    }
}

/// Properties of a scan job: persistent JSON
pub fn scan_properties() -> BasicProperties {
    BasicProperties::default()
        .with_content_type("application/json".into())
        .with_delivery_mode(PERSISTENT)
}

#[async_trait]
impl RelayChannels for AmqpChannels {
    async fn reply(&self, reply_to: &str, correlation_id: Option<&str>, body: &[u8]) -> Result<()> {
        self.inbound
            .basic_publish(
                "",
                reply_to,
                BasicPublishOptions::default(),
                body,
                reply_properties(correlation_id),
            )
            .await
            .map_err(|e| RelayError::Broker(format!("Reply to {reply_to} failed: {e}")))?
            .await
            .map_err(|e| RelayError::Broker(format!("Reply to {reply_to} failed: {e}")))?;

        Ok(())
    }

    async fn forward(&self, body: &[u8]) -> Result<()> {
        let confirmation = self
            .outbound
            .basic_publish(
                "",
                &self.scan_queue,
                BasicPublishOptions::default(),
                body,
                scan_properties(),
            )
            .await
            .map_err(|e| RelayError::Broker(format!("Forward to {} failed: {e}", self.scan_queue)))?
            .await
            .map_err(|e| RelayError::Broker(format!("Forward to {} failed: {e}", self.scan_queue)))?;

        if let Confirmation::Nack(_) = confirmation {
            return Err(RelayError::Broker(format!(
                "Broker rejected scan job on {}",
                self.scan_queue
            )));
        }

        Ok(())
    }
}

/// Acknowledges one delivery on the channel it arrived on
pub struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<()> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| RelayError::Broker(format!("Ack failed: {e}")))
    }

    async fn nack(&self) -> Result<()> {
        self.0
            .nack(BasicNackOptions {
                requeue: true,
                ..Default::default()
            })
            .await
            .map(|_| ())
            .map_err(|e| RelayError::Broker(format!("Nack failed: {e}")))
    }
}

/// Split a delivery into the request the relay handles and its acker
pub fn into_request(delivery: Delivery) -> (CreationRequest, AmqpAcker) {
    let request = request_from_parts(&delivery.properties, delivery.data);
    (request, AmqpAcker(delivery.acker))
}

/// Build a request from the properties and body of a delivery
pub fn request_from_parts(properties: &BasicProperties, payload: Vec<u8>) -> CreationRequest {
    CreationRequest {
        payload,
        correlation_id: properties
            .correlation_id()
            .as_ref()
            .map(|id| id.as_str().to_string()),
        reply_to: properties
            .reply_to()
            .as_ref()
            .map(|queue| queue.as_str().to_string()),
    }
}

//! Relay worker - one broker consumer per process
//!
//! The worker holds the two broker connections and drives the relay protocol
//! for every delivery on the creation queue. Handlers run concurrently up to
//! the configured in-flight limit; the same limit is the broker prefetch, so
//! the broker never pushes more requests than the worker will start.

use futures_util::{Stream, StreamExt};
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use super::protocol::{InboundMessage, Outcome, RelayContext};
use crate::broker::{into_request, Acknowledger, AmqpChannels, ConnectionManager};
use crate::config::RelayConfig;
use crate::types::{RelayError, Result};
use crate::wallet::{Ed25519AddressGenerator, HttpHeightSource, WalletCreationService};

/// Counts of how dispatched messages were finalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub acked: usize,
    pub nacked: usize,
    /// Relayed, but the ack did not reach the broker
    pub ack_failed: usize,
    pub ignored: usize,
    /// Handlers that panicked before finalizing
    pub aborted: usize,
}

impl DispatchStats {
    fn record(&mut self, worker_id: u64, joined: std::result::Result<Option<Outcome>, JoinError>) {
        match joined {
            Ok(Some(Outcome::Acked { .. })) => self.acked += 1,
            Ok(Some(Outcome::Nacked { .. })) => self.nacked += 1,
            Ok(Some(Outcome::AckFailed { .. })) => self.ack_failed += 1,
            Ok(None) => self.ignored += 1,
            Err(e) => {
                error!(worker = worker_id, "Request handler aborted: {}", e);
                self.aborted += 1;
            }
        }
    }
}

/// Relay every message of `messages`, at most `max_in_flight` at a time.
///
/// Returns once the stream has ended and all started handlers finished.
pub async fn dispatch<S, A>(
    context: Arc<RelayContext>,
    max_in_flight: usize,
    messages: S,
) -> DispatchStats
where
    S: Stream<Item = Option<InboundMessage<A>>>,
    A: Acknowledger + 'static,
{
    let worker_id = context.worker_id();
    let limiter = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut in_flight = JoinSet::new();
    let mut stats = DispatchStats::default();
    let mut messages = std::pin::pin!(messages);

    loop {
        // Only pull the next message once a handler slot is free
        let Ok(permit) = Arc::clone(&limiter).acquire_owned().await else {
            break;
        };
        let Some(message) = messages.next().await else {
            break;
        };

        let context = Arc::clone(&context);
        in_flight.spawn(async move {
            let outcome = context.handle(message).await;
            drop(permit);
            outcome
        });

        while let Some(joined) = in_flight.try_join_next() {
            stats.record(worker_id, joined);
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        stats.record(worker_id, joined);
    }

    stats
}

/// A relay worker process: two broker connections and one consumer
pub struct RelayWorker {
    id: u64,
    config: RelayConfig,
    connections: ConnectionManager,
    context: Arc<RelayContext>,
}

impl RelayWorker {
    /// Connect to both brokers and prepare the relay.
    ///
    /// Errors here are setup errors; the caller is expected to exit the
    /// process and leave recovery to the pool supervisor.
    pub async fn connect(id: u64, config: &RelayConfig) -> Result<Self> {
        config.validate()?;

        let heights = HttpHeightSource::new(&config.top_block_url, config.lookup_timeout)?;
        let service = WalletCreationService::new(
            Arc::new(Ed25519AddressGenerator::default()),
            Arc::new(heights),
        );

        let connections =
            ConnectionManager::connect(config, &format!("wallet-creator-{id}")).await?;
        let channels = AmqpChannels::new(
            connections.inbound().clone(),
            connections.outbound().clone(),
            config.scan_queue.clone(),
        );

        info!(
            worker = id,
            creation_queue = %config.creation_queue,
            scan_queue = %config.scan_queue,
            max_in_flight = config.max_in_flight,
            "Worker #{} connected to brokers",
            id
        );

        Ok(Self {
            id,
            config: config.clone(),
            connections,
            context: Arc::new(RelayContext::new(id, service, Arc::new(channels))),
        })
    }

    /// Consume the creation queue until the broker cancels the consumer.
    ///
    /// Never returns `Ok`: a cancelled consumer or a closed channel ends the
    /// worker so that a fresh process takes its place.
    pub async fn run(&self) -> Result<()> {
        let consumer_tag = format!("wallet-creator-{}-{}", self.id, uuid::Uuid::new_v4());
        let consumer = self
            .connections
            .inbound()
            .basic_consume(
                &self.config.creation_queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                RelayError::Broker(format!(
                    "Failed to consume {}: {e}",
                    self.config.creation_queue
                ))
            })?;

        info!(worker = self.id, "Worker #{} awaiting requests", self.id);

        let id = self.id;
        let messages = consumer.filter_map(move |delivery| async move {
            match delivery {
                Ok(delivery) => {
                    let (request, acker) = into_request(delivery);
                    Some(Some(InboundMessage::new(request, acker)))
                }
                Err(e) => {
                    warn!(worker = id, "Error receiving delivery: {}", e);
                    None
                }
            }
        });

        let stats = dispatch(Arc::clone(&self.context), self.config.max_in_flight, messages).await;

        warn!(
            worker = self.id,
            acked = stats.acked,
            nacked = stats.nacked,
            ack_failed = stats.ack_failed,
            "Worker #{} consumer closed",
            self.id
        );
        Err(RelayError::Broker(format!(
            "Consumer on {} was cancelled",
            self.config.creation_queue
        )))
    }
}

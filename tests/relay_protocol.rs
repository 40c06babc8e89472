//! Relay protocol scenarios against in-memory broker and block API fakes

use async_trait::async_trait;
use futures_util::stream;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wallet_workers::broker::{Acknowledger, RelayChannels};
use wallet_workers::relay::{
    dispatch, CreationRequest, InboundMessage, Outcome, RelayContext, ScanRequest,
};
use wallet_workers::types::{RelayError, Result};
use wallet_workers::wallet::{Ed25519AddressGenerator, HeightSource, WalletCreationService};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Reply {
        queue: String,
        correlation_id: Option<String>,
        body: Vec<u8>,
    },
    Forward(Vec<u8>),
    Ack,
    Nack,
}

type Log = Arc<Mutex<Vec<Event>>>;

#[derive(Default)]
struct FakeChannels {
    log: Log,
    fail_reply: bool,
    fail_forward: bool,
}

#[async_trait]
impl RelayChannels for FakeChannels {
    async fn reply(&self, reply_to: &str, correlation_id: Option<&str>, body: &[u8]) -> Result<()> {
        if self.fail_reply {
            return Err(RelayError::Broker("reply channel closed".into()));
        }
        self.log.lock().unwrap().push(Event::Reply {
            queue: reply_to.to_string(),
            correlation_id: correlation_id.map(str::to_string),
            body: body.to_vec(),
        });
        Ok(())
    }

    async fn forward(&self, body: &[u8]) -> Result<()> {
        if self.fail_forward {
            return Err(RelayError::Broker("scan job nacked".into()));
        }
        self.log.lock().unwrap().push(Event::Forward(body.to_vec()));
        Ok(())
    }
}

struct FakeAcker {
    log: Log,
    fail_ack: bool,
}

#[async_trait]
impl Acknowledger for FakeAcker {
    async fn ack(&self) -> Result<()> {
        self.log.lock().unwrap().push(Event::Ack);
        if self.fail_ack {
            return Err(RelayError::Broker("channel closed".into()));
        }
        Ok(())
    }

    async fn nack(&self) -> Result<()> {
        self.log.lock().unwrap().push(Event::Nack);
        Ok(())
    }
}

/// Block API fake: fixed answer, optional latency, counts calls and overlap
#[derive(Default)]
struct FakeHeights {
    height: Option<u64>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeHeights {
    fn answering(height: u64) -> Self {
        Self {
            height: Some(height),
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HeightSource for FakeHeights {
    async fn top_height(&self) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.height
            .ok_or_else(|| RelayError::Lookup("network error".into()))
    }
}

fn context(channels: FakeChannels, heights: Arc<FakeHeights>) -> RelayContext {
    let service =
        WalletCreationService::new(Arc::new(Ed25519AddressGenerator::default()), heights);
    RelayContext::new(1, service, Arc::new(channels))
}

fn request(correlation_id: &str, reply_to: Option<&str>, body: &[u8]) -> CreationRequest {
    CreationRequest {
        payload: body.to_vec(),
        correlation_id: Some(correlation_id.to_string()),
        reply_to: reply_to.map(str::to_string),
    }
}

fn message(log: &Log, request: CreationRequest) -> Option<InboundMessage<FakeAcker>> {
    Some(InboundMessage::new(
        request,
        FakeAcker {
            log: Arc::clone(log),
            fail_ack: false,
        },
    ))
}

fn events(log: &Log) -> Vec<Event> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_created_wallet_is_replied_forwarded_then_acked() {
    let log = Log::default();
    let heights = Arc::new(FakeHeights::answering(1_500_000));
    let relay = context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        heights,
    );

    let outcome = relay
        .handle(message(&log, request("abc", Some("q1"), b"{}")))
        .await
        .unwrap();

    let Outcome::Acked { address } = outcome else {
        panic!("expected ack, got {outcome:?}");
    };

    let events = events(&log);
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        Event::Reply {
            queue: "q1".to_string(),
            correlation_id: Some("abc".to_string()),
            body: address.as_bytes().to_vec(),
        }
    );

    let Event::Forward(body) = &events[1] else {
        panic!("expected scan forward, got {:?}", events[1]);
    };
    let scan = ScanRequest::from_bytes(body).unwrap();
    assert_eq!(scan.scan_height, 1_500_000);
    assert_eq!(scan.wallet.address, address);
    assert_eq!(scan.request, json!({}));

    assert_eq!(events[2], Event::Ack);
}

#[tokio::test]
async fn test_original_payload_travels_with_scan_job() {
    let log = Log::default();
    let relay = context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::new(FakeHeights::answering(7)),
    );

    let body = br#"{"amount": 10000, "callback": "https://shop.example/paid"}"#;
    relay
        .handle(message(&log, request("order-9", Some("replies"), body)))
        .await;

    let forwarded = events(&log)
        .into_iter()
        .find_map(|event| match event {
            Event::Forward(body) => Some(body),
            _ => None,
        })
        .unwrap();
    let scan: serde_json::Value = serde_json::from_slice(&forwarded).unwrap();
    assert_eq!(
        scan["request"],
        json!({"amount": 10000, "callback": "https://shop.example/paid"})
    );
    assert_eq!(scan["scanHeight"], json!(7));
    assert!(scan["wallet"]["spend"]["privateKey"].is_string());
}

#[tokio::test]
async fn test_lookup_failure_nacks_without_publishing() {
    let log = Log::default();
    let relay = context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::new(FakeHeights::failing()),
    );

    let outcome = relay
        .handle(message(&log, request("abc", Some("q1"), b"{}")))
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Nacked { .. }));
    assert_eq!(events(&log), vec![Event::Nack]);
}

#[tokio::test]
async fn test_failed_reply_nacks_and_skips_forward() {
    let log = Log::default();
    let relay = context(
        FakeChannels {
            log: Arc::clone(&log),
            fail_reply: true,
            ..Default::default()
        },
        Arc::new(FakeHeights::answering(10)),
    );

    let outcome = relay
        .handle(message(&log, request("abc", Some("q1"), b"{}")))
        .await
        .unwrap();

    assert!(!outcome.is_acked());
    assert_eq!(events(&log), vec![Event::Nack]);
}

#[tokio::test]
async fn test_failed_forward_nacks_after_reply() {
    let log = Log::default();
    let relay = context(
        FakeChannels {
            log: Arc::clone(&log),
            fail_forward: true,
            ..Default::default()
        },
        Arc::new(FakeHeights::answering(10)),
    );

    relay
        .handle(message(&log, request("abc", Some("q1"), b"{}")))
        .await;

    let events = events(&log);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::Reply { .. }));
    assert_eq!(events[1], Event::Nack);
}

#[tokio::test]
async fn test_request_without_reply_queue_is_rejected_before_lookup() {
    let log = Log::default();
    let heights = Arc::new(FakeHeights::answering(10));
    let relay = context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::clone(&heights),
    );

    relay.handle(message(&log, request("abc", None, b"{}"))).await;

    assert_eq!(events(&log), vec![Event::Nack]);
    assert_eq!(heights.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_json_payload_is_rejected_without_reply() {
    let log = Log::default();
    let relay = context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::new(FakeHeights::answering(10)),
    );

    relay
        .handle(message(&log, request("abc", Some("q1"), b"wallet please")))
        .await;

    assert_eq!(events(&log), vec![Event::Nack]);
}

#[tokio::test]
async fn test_empty_delivery_is_ignored() {
    let log = Log::default();
    let relay = context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::new(FakeHeights::answering(10)),
    );

    let outcome = relay.handle::<FakeAcker>(None).await;

    assert!(outcome.is_none());
    assert!(events(&log).is_empty());
}

#[tokio::test]
async fn test_failed_ack_is_never_followed_by_nack() {
    let log = Log::default();
    let relay = context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::new(FakeHeights::answering(10)),
    );

    let message = InboundMessage::new(
        request("abc", Some("q1"), b"{}"),
        FakeAcker {
            log: Arc::clone(&log),
            fail_ack: true,
        },
    );
    let outcome = relay.handle(Some(message)).await.unwrap();

    assert!(matches!(outcome, Outcome::AckFailed { .. }));
    assert!(!outcome.is_acked());
    let events = events(&log);
    assert_eq!(events.last(), Some(&Event::Ack));
    assert!(!events.contains(&Event::Nack));
}

#[tokio::test]
async fn test_dispatch_counts_failed_acks_separately() {
    let log = Log::default();
    let relay = Arc::new(context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::new(FakeHeights::answering(99)),
    ));

    let messages = vec![
        message(&log, request("1", Some("q"), b"{}")),
        Some(InboundMessage::new(
            request("2", Some("q"), b"{}"),
            FakeAcker {
                log: Arc::clone(&log),
                fail_ack: true,
            },
        )),
    ];

    let stats = dispatch(relay, 2, stream::iter(messages)).await;

    assert_eq!(stats.acked, 1);
    assert_eq!(stats.ack_failed, 1);
    assert_eq!(stats.nacked, 0);
}

#[tokio::test]
async fn test_dispatch_finalizes_every_message_once() {
    let log = Log::default();
    let relay = Arc::new(context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::new(FakeHeights::answering(99)),
    ));

    let messages = vec![
        message(&log, request("1", Some("q"), b"{}")),
        None,
        message(&log, request("2", None, b"{}")),
        message(&log, request("3", Some("q"), b"{}")),
    ];

    let stats = dispatch(relay, 4, stream::iter(messages)).await;

    assert_eq!(stats.acked, 2);
    assert_eq!(stats.nacked, 1);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.ack_failed, 0);
    assert_eq!(stats.aborted, 0);

    let events = events(&log);
    let finalized = events
        .iter()
        .filter(|event| matches!(event, Event::Ack | Event::Nack))
        .count();
    assert_eq!(finalized, 3);
}

#[tokio::test]
async fn test_dispatch_respects_in_flight_limit() {
    let log = Log::default();
    let heights = Arc::new(FakeHeights {
        height: Some(5),
        latency: Duration::from_millis(20),
        ..Default::default()
    });
    let relay = Arc::new(context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::clone(&heights),
    ));

    let messages: Vec<_> = (0..6)
        .map(|i| message(&log, request(&i.to_string(), Some("q"), b"{}")))
        .collect();

    let stats = dispatch(relay, 2, stream::iter(messages)).await;

    assert_eq!(stats.acked, 6);
    assert_eq!(heights.calls.load(Ordering::SeqCst), 6);
    assert!(heights.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_dispatch_overlaps_lookups() {
    let log = Log::default();
    let heights = Arc::new(FakeHeights {
        height: Some(5),
        latency: Duration::from_millis(20),
        ..Default::default()
    });
    let relay = Arc::new(context(
        FakeChannels {
            log: Arc::clone(&log),
            ..Default::default()
        },
        Arc::clone(&heights),
    ));

    let messages: Vec<_> = (0..4)
        .map(|i| message(&log, request(&i.to_string(), Some("q"), b"{}")))
        .collect();

    let stats = dispatch(relay, 8, stream::iter(messages)).await;

    assert_eq!(stats.acked, 4);
    assert!(heights.max_in_flight.load(Ordering::SeqCst) > 1);
}

//! Iterator state-machine properties: exhaustion, draining, sticky
//! failure, ordering, and close semantics, over both delivery modes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::U256;
use chainevents_core::{
    decoder::EventDecoder,
    error::{DecodeError, QueryError, StreamError},
    event::{DecodedEvent, RawLog},
    registry::MemoryRegistry,
    schema::{EventParam, EventSchema},
    types::ParamType,
};
use chainevents_evm::EvmEventDecoder;
use chainevents_stream::{
    backend::{LogBackend, LogSubscription, Unsubscriber},
    filter::{BlockRange, LogFilter, TopicFilter},
    iterator::EventIterator,
    EventClient,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

const TRANSFER_SIG: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

fn transfer_schema() -> EventSchema {
    EventSchema {
        name: "Transfer".into(),
        anonymous: false,
        inputs: vec![
            EventParam {
                name: "from".into(),
                ty: ParamType::Address,
                indexed: true,
            },
            EventParam {
                name: "to".into(),
                ty: ParamType::Address,
                indexed: true,
            },
            EventParam {
                name: "value".into(),
                ty: ParamType::Uint(256),
                indexed: false,
            },
        ],
    }
}

fn padded(addr: &str) -> String {
    format!("0x{}{addr}", "0".repeat(24))
}

fn transfer_raw(value: u64) -> RawLog {
    let mut data = vec![0u8; 32];
    data[24..].copy_from_slice(&value.to_be_bytes());
    RawLog {
        address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".into(),
        topics: vec![
            TRANSFER_SIG.into(),
            padded("d8da6bf26964af9d7eed9e03e53415d37aa96045"),
            padded("ab5801a7d398351b8be11c439e05c5b3259aec9b"),
        ],
        data,
        block_number: 19_000_000 + value,
        block_hash: None,
        tx_hash: format!("0x{value:064x}"),
        tx_index: 0,
        log_index: value as u32,
        removed: false,
    }
}

fn decoder() -> Arc<dyn EventDecoder> {
    Arc::new(EvmEventDecoder::new())
}

fn value_of(event: &DecodedEvent) -> u64 {
    event.field("value").unwrap().as_uint().unwrap().to::<u64>()
}

/// Decoder wrapper that counts decode attempts, for asserting a failed
/// iterator never decodes again.
struct CountingDecoder {
    inner: EvmEventDecoder,
    calls: Arc<AtomicUsize>,
}

impl EventDecoder for CountingDecoder {
    fn decode(&self, raw: &RawLog, schema: &EventSchema) -> Result<DecodedEvent, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(raw, schema)
    }
}

/// Live subscription plumbed to in-memory channels.
fn live_subscription(
    capacity: usize,
) -> (
    mpsc::Sender<RawLog>,
    mpsc::Sender<StreamError>,
    oneshot::Receiver<()>,
    LogSubscription,
) {
    let (records_tx, records_rx) = mpsc::channel(capacity);
    let (errors_tx, errors_rx) = mpsc::channel(1);
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        records_tx,
        errors_tx,
        cancel_rx,
        LogSubscription {
            records: records_rx,
            errors: errors_rx,
            unsubscriber: Unsubscriber::new(cancel_tx),
        },
    )
}

// ─── Historical mode ──────────────────────────────────────────────────────────

#[tokio::test]
async fn historical_yields_n_then_clean_false() {
    let records: Vec<_> = (1..=3).map(transfer_raw).collect();
    let mut iter = EventIterator::historical(transfer_schema(), decoder(), records);

    for expected in 1..=3u64 {
        assert!(iter.advance().await);
        assert_eq!(value_of(iter.current().unwrap()), expected);
    }

    assert!(!iter.advance().await);
    assert!(iter.error().is_none(), "exhaustion is not a failure");
    assert!(iter.current().is_none());

    // exhaustion is stable
    assert!(!iter.advance().await);
}

#[tokio::test]
async fn historical_empty_is_immediately_exhausted() {
    let mut iter = EventIterator::historical(transfer_schema(), decoder(), vec![]);
    assert!(!iter.advance().await);
    assert!(iter.error().is_none());
}

#[tokio::test]
async fn historical_decode_failure_is_sticky() {
    let mut bad = transfer_raw(2);
    bad.topics.pop(); // drops an indexed topic → shape mismatch

    let calls = Arc::new(AtomicUsize::new(0));
    let counting = Arc::new(CountingDecoder {
        inner: EvmEventDecoder::new(),
        calls: Arc::clone(&calls),
    });

    let records = vec![transfer_raw(1), bad, transfer_raw(3)];
    let mut iter = EventIterator::historical(transfer_schema(), counting, records);

    assert!(iter.advance().await);
    assert!(!iter.advance().await);
    assert!(matches!(iter.error(), Some(StreamError::Decode(_))));

    // sticky: no further decode attempts, error unchanged
    let decodes_at_failure = calls.load(Ordering::SeqCst);
    assert!(!iter.advance().await);
    assert!(!iter.advance().await);
    assert_eq!(calls.load(Ordering::SeqCst), decodes_at_failure);
    assert!(matches!(iter.error(), Some(StreamError::Decode(_))));
}

// ─── Live mode ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_preserves_delivery_order() {
    let (records_tx, errors_tx, _cancel_rx, sub) = live_subscription(16);
    let mut iter = EventIterator::live(transfer_schema(), decoder(), sub);

    for i in 1..=5u64 {
        records_tx.send(transfer_raw(i)).await.unwrap();
    }
    drop(records_tx);
    drop(errors_tx);

    let mut seen = Vec::new();
    while iter.advance().await {
        seen.push(value_of(iter.current().unwrap()));
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert!(iter.error().is_none());
}

#[tokio::test]
async fn live_drains_buffer_after_clean_completion() {
    let (records_tx, errors_tx, _cancel_rx, sub) = live_subscription(16);
    let mut iter = EventIterator::live(transfer_schema(), decoder(), sub);

    records_tx.send(transfer_raw(1)).await.unwrap();
    records_tx.send(transfer_raw(2)).await.unwrap();
    // upstream completes while records are still buffered; the record
    // sender stays alive, so only the error channel signals completion
    drop(errors_tx);

    assert!(iter.advance().await);
    assert!(iter.advance().await);

    let done = timeout(Duration::from_secs(1), iter.advance()).await;
    assert_eq!(done.unwrap(), false);
    assert!(iter.error().is_none(), "stream end is not a failure");

    drop(records_tx);
}

#[tokio::test]
async fn live_buffered_records_beat_pending_error() {
    let (records_tx, errors_tx, _cancel_rx, sub) = live_subscription(16);
    let mut iter = EventIterator::live(transfer_schema(), decoder(), sub);

    records_tx.send(transfer_raw(1)).await.unwrap();
    records_tx.send(transfer_raw(2)).await.unwrap();
    errors_tx.send(StreamError::Closed).await.unwrap();

    // both buffered records are delivered before the error is acted on
    assert!(iter.advance().await);
    assert_eq!(value_of(iter.current().unwrap()), 1);
    assert!(iter.advance().await);
    assert_eq!(value_of(iter.current().unwrap()), 2);

    assert!(!iter.advance().await);
    assert!(matches!(iter.error(), Some(StreamError::Closed)));
}

#[tokio::test]
async fn live_error_after_drain_is_not_misread_as_exhaustion() {
    let (records_tx, errors_tx, _cancel_rx, sub) = live_subscription(16);
    let mut iter = EventIterator::live(transfer_schema(), decoder(), sub);

    records_tx.send(transfer_raw(1)).await.unwrap();
    errors_tx.send(StreamError::Closed).await.unwrap();
    // record channel closes with the error still queued
    drop(records_tx);
    drop(errors_tx);

    assert!(iter.advance().await);
    assert!(!iter.advance().await);
    assert!(matches!(iter.error(), Some(StreamError::Closed)));
}

#[tokio::test]
async fn live_upstream_error_is_sticky() {
    let (_records_tx, errors_tx, _cancel_rx, sub) = live_subscription(16);
    let mut iter = EventIterator::live(transfer_schema(), decoder(), sub);

    errors_tx
        .send(StreamError::SubscriptionRejected {
            reason: "node said no".into(),
        })
        .await
        .unwrap();

    assert!(!iter.advance().await);
    assert!(matches!(
        iter.error(),
        Some(StreamError::SubscriptionRejected { .. })
    ));
    assert!(!iter.advance().await);
    assert!(matches!(
        iter.error(),
        Some(StreamError::SubscriptionRejected { .. })
    ));
}

// ─── Close semantics ──────────────────────────────────────────────────────────

#[tokio::test]
async fn close_is_idempotent_and_fires_unsubscribe_once() {
    let (_records_tx, _errors_tx, mut cancel_rx, sub) = live_subscription(16);
    let iter = EventIterator::live(transfer_schema(), decoder(), sub);

    iter.close();
    iter.close();
    assert!(cancel_rx.try_recv().is_ok(), "unsubscribe fired exactly once");
}

#[tokio::test]
async fn close_unblocks_a_blocked_advance() {
    let (_records_tx, _errors_tx, mut cancel_rx, sub) = live_subscription(16);
    let mut iter = EventIterator::live(transfer_schema(), decoder(), sub);
    let handle = iter.close_handle();

    let task = tokio::spawn(async move {
        let advanced = iter.advance().await;
        (advanced, iter.error().is_none())
    });

    // let the advance reach its blocking select, then close from outside
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.close();

    let (advanced, no_error) = timeout(Duration::from_secs(1), task)
        .await
        .expect("advance did not unblock")
        .unwrap();
    assert!(!advanced);
    assert!(no_error, "close is not an error");
    assert!(cancel_rx.try_recv().is_ok());
}

#[tokio::test]
async fn closed_iterator_stays_closed() {
    let (records_tx, _errors_tx, _cancel_rx, sub) = live_subscription(16);
    let mut iter = EventIterator::live(transfer_schema(), decoder(), sub);

    records_tx.send(transfer_raw(1)).await.unwrap();
    iter.close();

    assert!(!iter.advance().await);
    assert!(iter.error().is_none());
}

#[tokio::test]
async fn drop_releases_the_subscription() {
    let (_records_tx, _errors_tx, mut cancel_rx, sub) = live_subscription(16);
    let iter = EventIterator::live(transfer_schema(), decoder(), sub);
    drop(iter);
    assert!(cancel_rx.try_recv().is_ok());
}

// ─── Client surface ───────────────────────────────────────────────────────────

struct MockBackend {
    logs: Vec<RawLog>,
    sub: Mutex<Option<LogSubscription>>,
    queries: AtomicUsize,
}

impl MockBackend {
    fn historical(logs: Vec<RawLog>) -> Self {
        Self {
            logs,
            sub: Mutex::new(None),
            queries: AtomicUsize::new(0),
        }
    }

    fn live(sub: LogSubscription) -> Self {
        Self {
            logs: vec![],
            sub: Mutex::new(Some(sub)),
            queries: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl LogBackend for MockBackend {
    async fn query_logs(&self, _filter: &LogFilter) -> Result<Vec<RawLog>, QueryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.logs.clone())
    }

    async fn subscribe_logs(&self, _filter: &LogFilter) -> Result<LogSubscription, StreamError> {
        self.sub.lock().unwrap().take().ok_or(StreamError::Closed)
    }
}

fn client_with(backend: Arc<MockBackend>) -> EventClient {
    let registry = MemoryRegistry::new();
    registry.insert(transfer_schema()).unwrap();
    EventClient::new(backend, Arc::new(registry), decoder())
}

#[tokio::test]
async fn filter_events_end_to_end() {
    let backend = Arc::new(MockBackend::historical(
        (1..=2).map(transfer_raw).collect(),
    ));
    let client = client_with(Arc::clone(&backend));

    let mut iter = client
        .filter_events("Transfer", TopicFilter::new(), BlockRange::default())
        .await
        .unwrap();

    assert!(iter.advance().await);
    assert_eq!(value_of(iter.current().unwrap()), 1);
    assert!(iter.advance().await);
    assert!(!iter.advance().await);
    assert!(iter.error().is_none());
}

#[tokio::test]
async fn invalid_range_fails_before_any_backend_call() {
    let backend = Arc::new(MockBackend::historical(vec![]));
    let client = client_with(Arc::clone(&backend));

    let err = client
        .filter_events(
            "Transfer",
            TopicFilter::new(),
            BlockRange::new(100u64, 50u64),
        )
        .await;
    assert!(matches!(err, Err(QueryError::InvalidRange { .. })));
    assert_eq!(backend.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_event_is_rejected() {
    let backend = Arc::new(MockBackend::historical(vec![]));
    let client = client_with(backend);

    let err = client
        .filter_events("NoSuchEvent", TopicFilter::new(), BlockRange::default())
        .await;
    assert!(matches!(err, Err(QueryError::UnknownEvent { .. })));

    let err = client.parse_event(&transfer_raw(1), "NoSuchEvent");
    assert!(matches!(err, Err(DecodeError::UnknownEvent { .. })));
}

#[tokio::test]
async fn parse_event_decodes_single_record() {
    let backend = Arc::new(MockBackend::historical(vec![]));
    let client = client_with(backend);

    let event = client.parse_event(&transfer_raw(42), "Transfer").unwrap();
    assert_eq!(event.field("value").unwrap().as_uint(), Some(U256::from(42u64)));
}

#[tokio::test]
async fn watch_forwards_events_in_order_then_ends_clean() {
    let (records_tx, errors_tx, _cancel_rx, sub) = live_subscription(16);
    let client = client_with(Arc::new(MockBackend::live(sub)));

    let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let handle = client
        .watch_events("Transfer", TopicFilter::new(), move |event: DecodedEvent| {
            sink_seen.lock().unwrap().push(value_of(&event));
        })
        .await
        .unwrap();

    for i in 1..=3u64 {
        records_tx.send(transfer_raw(i)).await.unwrap();
    }
    drop(records_tx);
    drop(errors_tx);

    let outcome = timeout(Duration::from_secs(1), handle.join()).await.unwrap();
    assert!(outcome.is_none(), "clean stream end");
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn watch_close_stops_delivery() {
    let (_records_tx, _errors_tx, mut cancel_rx, sub) = live_subscription(16);
    let client = client_with(Arc::new(MockBackend::live(sub)));

    let handle = client
        .watch_events("Transfer", TopicFilter::new(), |_event: DecodedEvent| {})
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.close();

    let outcome = timeout(Duration::from_secs(1), handle.join()).await.unwrap();
    assert!(outcome.is_none(), "caller close is not an error");
    assert!(cancel_rx.try_recv().is_ok());
}

#[tokio::test]
async fn watch_surfaces_upstream_error() {
    let (_records_tx, errors_tx, _cancel_rx, sub) = live_subscription(16);
    let client = client_with(Arc::new(MockBackend::live(sub)));

    let handle = client
        .watch_events("Transfer", TopicFilter::new(), |_event: DecodedEvent| {})
        .await
        .unwrap();

    errors_tx.send(StreamError::Closed).await.unwrap();

    let outcome = timeout(Duration::from_secs(1), handle.join()).await.unwrap();
    assert!(matches!(outcome, Some(StreamError::Closed)));
}

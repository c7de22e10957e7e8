//! `RpcBackend` — the Ethereum JSON-RPC implementation of `LogBackend`.
//!
//! Historical queries go over HTTP (`eth_getLogs`); live subscriptions go
//! over a WebSocket (`eth_subscribe("logs", filter)`). One WebSocket
//! connection serves one subscription; cancelling sends a best-effort
//! `eth_unsubscribe` before closing the socket.

use crate::backend::{LogBackend, LogSubscription, Unsubscriber};
use crate::filter::LogFilter;
use async_trait::async_trait;
use chainevents_core::{
    error::{QueryError, StreamError},
    event::RawLog,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// JSON-RPC log backend: HTTP endpoint for queries, optional WebSocket
/// endpoint for subscriptions.
pub struct RpcBackend {
    http_url: String,
    ws_url: Option<String>,
    client: reqwest::Client,
    channel_capacity: usize,
}

impl RpcBackend {
    /// Create a backend from an HTTP(S) query endpoint. URLs are validated
    /// here so malformed endpoints fail at construction, not on first use.
    pub fn new(http_url: impl Into<String>) -> Result<Self, StreamError> {
        let http_url = http_url.into();
        let parsed = Url::parse(&http_url).map_err(|e| StreamError::ConnectionFailed {
            url: http_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StreamError::ConnectionFailed {
                url: http_url,
                reason: "expected http:// or https:// scheme".into(),
            });
        }

        Ok(Self {
            http_url,
            ws_url: None,
            client: reqwest::Client::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        })
    }

    /// Configure the WS(S) endpoint live subscriptions connect to.
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Result<Self, StreamError> {
        let ws_url = ws_url.into();
        let parsed = Url::parse(&ws_url).map_err(|e| StreamError::ConnectionFailed {
            url: ws_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(StreamError::ConnectionFailed {
                url: ws_url,
                reason: "expected ws:// or wss:// scheme".into(),
            });
        }
        self.ws_url = Some(ws_url);
        Ok(self)
    }

    /// Override the live delivery channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

#[async_trait]
impl LogBackend for RpcBackend {
    async fn query_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, QueryError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getLogs",
            "params": [rpc_filter_object(filter, true)],
        });

        let response = self
            .client
            .post(&self.http_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        if let Some(err) = payload.get("error") {
            return Err(QueryError::Rpc {
                code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        let result = payload
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| QueryError::MalformedLog {
                reason: "missing result array".into(),
            })?;

        // eth_getLogs returns logs in block / log-index order; preserved.
        result
            .iter()
            .map(|obj| {
                parse_log_object(obj).ok_or_else(|| QueryError::MalformedLog {
                    reason: obj.to_string(),
                })
            })
            .collect()
    }

    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription, StreamError> {
        let ws_url = self.ws_url.as_ref().ok_or_else(|| StreamError::SubscriptionRejected {
            reason: "no websocket endpoint configured".into(),
        })?;
        let (ws, _) = connect_async(ws_url)
            .await
            .map_err(|e| StreamError::ConnectionFailed {
                url: ws_url.clone(),
                reason: e.to_string(),
            })?;
        info!(url = %ws_url, "websocket connected");

        let (records_tx, records_rx) = mpsc::channel(self.channel_capacity);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let filter_obj = rpc_filter_object(filter, false);
        tokio::spawn(run_subscription(ws, filter_obj, records_tx, errors_tx, cancel_rx));

        Ok(LogSubscription {
            records: records_rx,
            errors: errors_rx,
            unsubscriber: Unsubscriber::new(cancel_tx),
        })
    }
}

// ─── WebSocket subscription loop ──────────────────────────────────────────────

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn run_subscription(
    ws: WsStream,
    filter_obj: Value,
    records_tx: mpsc::Sender<RawLog>,
    errors_tx: mpsc::Sender<StreamError>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let (mut write, mut read) = ws.split();

    let sub_msg = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_subscribe",
        "params": ["logs", filter_obj],
    });
    if let Err(e) = write.send(Message::Text(sub_msg.to_string())).await {
        warn!(error = %e, "failed to send eth_subscribe");
        let _ = errors_tx.send(StreamError::Closed).await;
        return;
    }

    let mut subscription_id: Option<String> = None;

    loop {
        tokio::select! {
            // Iterator closed or dropped: unsubscribe and stop. Dropping
            // both senders afterwards signals clean completion downstream.
            _ = &mut cancel_rx => {
                if let Some(id) = &subscription_id {
                    let unsub = json!({
                        "jsonrpc": "2.0",
                        "id": 2,
                        "method": "eth_unsubscribe",
                        "params": [id],
                    });
                    let _ = write.send(Message::Text(unsub.to_string())).await;
                }
                let _ = write.send(Message::Close(None)).await;
                debug!("subscription cancelled");
                return;
            }

            incoming = read.next() => match incoming {
                None => {
                    let _ = errors_tx.send(StreamError::Closed).await;
                    return;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "websocket error");
                    let _ = errors_tx.send(StreamError::Closed).await;
                    return;
                }
                Some(Ok(Message::Text(text))) => match parse_ws_message(&text) {
                    WsMessage::Confirmed(id) => {
                        debug!(subscription = %id, "subscription confirmed");
                        subscription_id = Some(id);
                    }
                    WsMessage::Rejected(reason) => {
                        let _ = errors_tx
                            .send(StreamError::SubscriptionRejected { reason })
                            .await;
                        return;
                    }
                    WsMessage::Log(raw) => {
                        if records_tx.send(raw).await.is_err() {
                            // Receiver dropped: iterator is gone.
                            return;
                        }
                    }
                    WsMessage::Ignored => {}
                },
                Some(Ok(Message::Close(_))) => {
                    info!("websocket closed by server");
                    let _ = errors_tx.send(StreamError::Closed).await;
                    return;
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(_)) => {} // binary / pong — ignore
            }
        }
    }
}

// ─── Message parsing ──────────────────────────────────────────────────────────

/// Classification of one incoming WebSocket text frame.
#[derive(Debug)]
enum WsMessage {
    /// `eth_subscribe` succeeded; carries the subscription id
    Confirmed(String),
    /// `eth_subscribe` was rejected by the node
    Rejected(String),
    /// A log notification
    Log(RawLog),
    /// Confirmation replays, removed (reorged) logs, unparseable frames
    Ignored,
}

fn parse_ws_message(text: &str) -> WsMessage {
    let Ok(v) = serde_json::from_str::<Value>(text) else {
        return WsMessage::Ignored;
    };

    // Response to our eth_subscribe request
    if v.get("id").and_then(Value::as_i64) == Some(1) {
        if let Some(err) = v.get("error") {
            let reason = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            return WsMessage::Rejected(reason);
        }
        if let Some(id) = v.get("result").and_then(Value::as_str) {
            return WsMessage::Confirmed(id.to_string());
        }
        return WsMessage::Ignored;
    }

    // Log notifications arrive as eth_subscription method calls
    if v.get("method").and_then(Value::as_str) != Some("eth_subscription") {
        return WsMessage::Ignored;
    }
    let Some(result) = v.get("params").and_then(|p| p.get("result")) else {
        return WsMessage::Ignored;
    };
    match parse_log_object(result) {
        Some(raw) if raw.removed => WsMessage::Ignored,
        Some(raw) => WsMessage::Log(raw),
        None => WsMessage::Ignored,
    }
}

/// Parse a JSON-RPC log object (shared by `eth_getLogs` results and
/// `eth_subscription` notifications). Returns `None` on a malformed
/// object.
pub(crate) fn parse_log_object(v: &Value) -> Option<RawLog> {
    let address = v.get("address")?.as_str()?.to_string();
    let topics: Vec<String> = v
        .get("topics")?
        .as_array()?
        .iter()
        .map(|t| t.as_str().map(String::from))
        .collect::<Option<_>>()?;

    let data_hex = v.get("data").and_then(Value::as_str).unwrap_or("0x");
    let data = hex::decode(data_hex.strip_prefix("0x").unwrap_or(data_hex)).ok()?;

    Some(RawLog {
        address,
        topics,
        data,
        block_number: hex_to_u64(v.get("blockNumber"))?,
        block_hash: v
            .get("blockHash")
            .and_then(Value::as_str)
            .map(String::from),
        tx_hash: v.get("transactionHash")?.as_str()?.to_string(),
        tx_index: hex_to_u64(v.get("transactionIndex")).unwrap_or(0) as u32,
        log_index: hex_to_u64(v.get("logIndex"))? as u32,
        removed: v.get("removed").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn hex_to_u64(v: Option<&Value>) -> Option<u64> {
    let s = v?.as_str()?;
    u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok()
}

/// Build the JSON-RPC filter object. `eth_getLogs` takes the block range;
/// `eth_subscribe("logs")` does not.
fn rpc_filter_object(filter: &LogFilter, include_range: bool) -> Value {
    let mut obj = serde_json::Map::new();

    if include_range {
        if let Some(from) = filter.range.from_block {
            obj.insert("fromBlock".into(), json!(format!("0x{from:x}")));
        }
        if let Some(to) = filter.range.to_block {
            obj.insert("toBlock".into(), json!(format!("0x{to:x}")));
        }
    }

    if !filter.addresses.is_empty() {
        obj.insert("address".into(), json!(filter.addresses));
    }

    // topics: [topic0, t1, t2, t3] — null matches anything, an array ORs
    // its values. Trailing nulls are trimmed.
    let mut topics: Vec<Value> = vec![filter
        .topic0
        .as_ref()
        .map(|t| json!(t))
        .unwrap_or(Value::Null)];
    for position in filter.topics.positions() {
        topics.push(match position {
            None => Value::Null,
            Some(values) if values.len() == 1 => json!(values[0]),
            Some(values) => json!(values),
        });
    }
    while topics.len() > 1 && topics.last() == Some(&Value::Null) {
        topics.pop();
    }
    if !(topics.len() == 1 && topics[0].is_null()) {
        obj.insert("topics".into(), Value::Array(topics));
    }

    Value::Object(obj)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

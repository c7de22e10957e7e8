//! Error types for the ChainEvents pipeline.

use thiserror::Error;

/// Errors that can occur while decoding a single log against a schema.
///
/// A `DecodeError` always means the record's shape does not match the
/// requested event — wrong event name, wrong contract, or corrupt data.
/// It is never retryable.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event '{name}'")]
    UnknownEvent { name: String },

    #[error("topic count mismatch for {event}: expected {expected}, got {got}")]
    TopicCountMismatch {
        event: String,
        expected: usize,
        got: usize,
    },

    #[error("signature mismatch: expected {expected}, got {got}")]
    SignatureMismatch { expected: String, got: String },

    #[error("invalid topic at position {position}: {reason}")]
    InvalidTopic { position: usize, reason: String },

    #[error("payload decode failed for {event}: {reason}")]
    PayloadMismatch { event: String, reason: String },
}

/// Errors raised when a historical log query cannot be served.
///
/// These surface at `filter_events` time, before any iterator exists.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid block range: from {from} > to {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("unknown event '{name}'")]
    UnknownEvent { name: String },

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed log object: {reason}")]
    MalformedLog { reason: String },
}

/// Errors from a live log subscription.
///
/// An iterator whose upstream fails stores one of these as its sticky
/// terminal error. Re-subscribing is caller policy, not handled here.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connection failed: {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("subscription rejected: {reason}")]
    SubscriptionRejected { reason: String },

    #[error("stream closed unexpectedly")]
    Closed,

    #[error("unknown event '{name}'")]
    UnknownEvent { name: String },

    #[error("decode error in stream: {0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Other(String),
}

/// Errors from the schema registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("event schema '{name}' already registered")]
    AlreadyExists { name: String },

    #[error("invalid param type: {0}")]
    InvalidType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

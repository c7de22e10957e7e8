//! # chainevents-stream
//!
//! The log iteration and subscription engine for ChainEvents.
//!
//! One `EventIterator` state machine serves both delivery modes:
//!
//! ```text
//! filter_events ─ eth_getLogs ──► Vec<RawLog> ─┐
//!                                              ├─► RecordSource ──► advance()
//! stream_events ─ eth_subscribe ► channel pair ┘        │
//!                                                       ▼
//!                                             EventDecoder::decode
//!                                                       │
//!                                                       ▼
//!                                        current() / error() / close()
//! ```
//!
//! `watch_events` drives the same advance loop from a spawned task and
//! pushes each decoded event into a caller-supplied sink.

pub mod backend;
pub mod client;
pub mod filter;
pub mod iterator;
pub mod rpc;
pub mod watcher;

pub use backend::{LogBackend, LogSubscription, Unsubscriber};
pub use client::EventClient;
pub use filter::{BlockRange, LogFilter, TopicFilter};
pub use iterator::{CloseHandle, EventIterator};
pub use rpc::RpcBackend;
pub use watcher::{EventSink, WatchHandle};

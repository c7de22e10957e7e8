//! `LogBackend` — abstraction over the query/subscription backend.
//!
//! A backend serves two operations: a one-shot historical query and a live
//! subscription. The live side hands back a channel pair plus the
//! subscription's release handle; the iterator owns all three.

use crate::filter::LogFilter;
use async_trait::async_trait;
use chainevents_core::{
    error::{QueryError, StreamError},
    event::RawLog,
};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

/// A live log subscription: in-order record delivery, an error channel for
/// upstream faults, and the unsubscribe handle.
///
/// Closure semantics: the backend dropping the error sender signals clean
/// upstream completion; an explicit message on it signals failure. Records
/// already buffered in the delivery channel remain readable either way.
pub struct LogSubscription {
    pub records: mpsc::Receiver<RawLog>,
    pub errors: mpsc::Receiver<StreamError>,
    pub unsubscriber: Unsubscriber,
}

/// Releases an upstream subscription exactly once.
///
/// The signal is a oneshot the producer task selects on; firing it (or
/// dropping this handle) tells the producer to unsubscribe and stop.
/// Safe to call from any thread, any number of times.
pub struct Unsubscriber {
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl Unsubscriber {
    pub fn new(cancel: oneshot::Sender<()>) -> Self {
        Self {
            cancel: Mutex::new(Some(cancel)),
        }
    }

    /// An unsubscriber with nothing to release (historical mode).
    pub fn noop() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Fire the release signal. Only the first call sends; the rest are
    /// no-ops.
    pub fn unsubscribe(&self) {
        if let Some(tx) = self.cancel.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

/// The external query/subscription backend the iterator consumes.
#[async_trait]
pub trait LogBackend: Send + Sync {
    /// Fetch the finite collection of historical logs matching the filter,
    /// in block/log-index order.
    async fn query_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, QueryError>;

    /// Open a live subscription for logs matching the filter, from now on.
    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription, StreamError>;
}

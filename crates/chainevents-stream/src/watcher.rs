//! Push-style delivery: a spawned task drives the advance loop and
//! forwards each decoded event to a caller-supplied sink.

use crate::iterator::{CloseHandle, EventIterator};
use chainevents_core::{error::StreamError, event::DecodedEvent};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives decoded events from a watch task.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: DecodedEvent);
}

/// Blanket impl so closures can be used as sinks.
impl<F: Fn(DecodedEvent) + Send + Sync> EventSink for F {
    fn on_event(&self, event: DecodedEvent) {
        self(event)
    }
}

/// Handle to a running watch task.
///
/// Closing stops delivery and releases the subscription; `join` waits for
/// the task to finish and yields the terminal error, or `None` when the
/// stream ended cleanly or was closed.
pub struct WatchHandle {
    close: CloseHandle,
    join: JoinHandle<Option<StreamError>>,
}

impl WatchHandle {
    /// Stop watching. Idempotent; safe while the task is mid-advance.
    pub fn close(&self) {
        self.close.close();
    }

    /// A standalone close handle, e.g. to hand to a shutdown task.
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Wait for the watch task to end and return its terminal error, if
    /// any.
    pub async fn join(self) -> Option<StreamError> {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => Some(StreamError::Other(format!("watch task panicked: {e}"))),
        }
    }
}

/// Spawn the forwarding loop over an iterator.
pub(crate) fn spawn_watch<S>(mut iter: EventIterator, sink: S) -> WatchHandle
where
    S: EventSink + 'static,
{
    let close = iter.close_handle();
    let join = tokio::spawn(async move {
        while iter.advance().await {
            if let Some(event) = iter.take_current() {
                sink.on_event(event);
            }
        }
        let outcome = iter.take_error();
        match &outcome {
            Some(err) => warn!(event = iter.event_name(), error = %err, "watch ended with error"),
            None => debug!(event = iter.event_name(), "watch ended"),
        }
        outcome
    });
    WatchHandle { close, join }
}

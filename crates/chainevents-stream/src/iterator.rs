//! `EventIterator` — the pull-based advance/current/error/close contract
//! over decoded events.
//!
//! One state machine serves both delivery modes behind a tagged record
//! source: a finite backlog cursor (historical) or a channel pair (live).
//!
//! Terminal conditions are sticky: once a decode or upstream error is
//! stored, every later `advance` returns `false` without touching the
//! source again. Upstream completion with records still buffered enters a
//! draining phase that empties the buffer before reporting exhaustion —
//! normal stream end is never classified as failure.

use crate::backend::{LogSubscription, Unsubscriber};
use chainevents_core::{
    decoder::EventDecoder,
    error::StreamError,
    event::{DecodedEvent, RawLog},
    schema::EventSchema,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

/// Where records come from.
enum RecordSource {
    /// Historical mode: an already-retrieved, in-order collection.
    Backlog(std::vec::IntoIter<RawLog>),
    /// Live mode: in-order delivery plus an upstream error/completion
    /// channel. The error sender dropping means clean completion.
    Live {
        records: mpsc::Receiver<RawLog>,
        errors: mpsc::Receiver<StreamError>,
    },
}

/// Close state shared between the iterator, its `CloseHandle` clones, and
/// nothing else. Closing releases the subscription exactly once (the
/// `Unsubscriber` enforces once-ness) and wakes any advance blocked on the
/// watch channel.
struct Shared {
    closed: watch::Sender<bool>,
    unsubscriber: Unsubscriber,
}

impl Shared {
    fn close(&self) {
        self.unsubscriber.unsubscribe();
        let _ = self.closed.send(true);
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Closes an iterator from another task, e.g. while an `advance` is
/// blocked waiting on live delivery. The blocked call unblocks with
/// `false`.
#[derive(Clone)]
pub struct CloseHandle {
    shared: Arc<Shared>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.shared.close();
    }
}

/// Outcome of one poll of the record source, applied to iterator state
/// after all source borrows are released.
enum Step {
    Deliver(RawLog),
    Fail(StreamError),
    Exhaust,
    Closed,
    Drain,
}

/// Pull-based iterator over decoded events for one schema.
pub struct EventIterator {
    schema: EventSchema,
    decoder: Arc<dyn EventDecoder>,
    source: RecordSource,
    /// Set when the upstream completed but buffered records may remain
    draining: bool,
    current: Option<DecodedEvent>,
    error: Option<StreamError>,
    exhausted: bool,
    shared: Arc<Shared>,
    closed_rx: watch::Receiver<bool>,
}

impl EventIterator {
    fn new(
        schema: EventSchema,
        decoder: Arc<dyn EventDecoder>,
        source: RecordSource,
        unsubscriber: Unsubscriber,
    ) -> Self {
        let (closed_tx, closed_rx) = watch::channel(false);
        Self {
            schema,
            decoder,
            source,
            draining: false,
            current: None,
            error: None,
            exhausted: false,
            shared: Arc::new(Shared {
                closed: closed_tx,
                unsubscriber,
            }),
            closed_rx,
        }
    }

    /// Iterator over an already-retrieved collection of logs.
    pub fn historical(
        schema: EventSchema,
        decoder: Arc<dyn EventDecoder>,
        records: Vec<RawLog>,
    ) -> Self {
        Self::new(
            schema,
            decoder,
            RecordSource::Backlog(records.into_iter()),
            Unsubscriber::noop(),
        )
    }

    /// Iterator over a live subscription. Takes sole ownership of the
    /// subscription; closing (or dropping) the iterator releases it.
    pub fn live(schema: EventSchema, decoder: Arc<dyn EventDecoder>, sub: LogSubscription) -> Self {
        Self::new(
            schema,
            decoder,
            RecordSource::Live {
                records: sub.records,
                errors: sub.errors,
            },
            sub.unsubscriber,
        )
    }

    /// Attempt to produce the next decoded event.
    ///
    /// Returns `true` with the event readable via [`current`](Self::current).
    /// A `false` return is deliberately ambiguous between clean exhaustion
    /// and failure — check [`error`](Self::error) to distinguish.
    ///
    /// Historical mode never awaits. Live mode suspends until a record
    /// arrives, the upstream completes or fails, or the iterator is closed.
    pub async fn advance(&mut self) -> bool {
        if self.error.is_some() || self.exhausted || self.shared.is_closed() {
            self.current = None;
            return false;
        }

        loop {
            let step = match &mut self.source {
                RecordSource::Backlog(records) => match records.next() {
                    Some(raw) => Step::Deliver(raw),
                    None => Step::Exhaust,
                },

                RecordSource::Live { records, errors } => {
                    if self.draining {
                        // Upstream already completed: empty the buffer
                        // without blocking, then report exhaustion.
                        match records.try_recv() {
                            Ok(raw) => Step::Deliver(raw),
                            Err(_) => Step::Exhaust,
                        }
                    } else {
                        tokio::select! {
                            biased;

                            // Caller close wins over anything still in flight.
                            _ = self.closed_rx.changed() => Step::Closed,

                            // Buffered records outrank a pending error or
                            // completion signal: normal stream end must
                            // drain before any terminal verdict.
                            maybe_record = records.recv() => match maybe_record {
                                Some(raw) => Step::Deliver(raw),
                                None => {
                                    // Delivery channel closed and fully
                                    // drained. A queued error still beats
                                    // clean exhaustion.
                                    match errors.try_recv() {
                                        Ok(err) => Step::Fail(err),
                                        Err(_) => Step::Exhaust,
                                    }
                                }
                            },

                            maybe_error = errors.recv() => match maybe_error {
                                Some(err) => Step::Fail(err),
                                // Error channel closed without a message:
                                // upstream completed cleanly. Drain what is
                                // buffered, then exhaust.
                                None => Step::Drain,
                            },
                        }
                    }
                }
            };

            match step {
                Step::Deliver(raw) => return self.deliver(raw),
                Step::Fail(err) => return self.fail(err),
                Step::Exhaust => return self.exhaust(),
                Step::Closed => {
                    self.current = None;
                    return false;
                }
                Step::Drain => {
                    debug!(event = %self.schema.name, "upstream completed, draining");
                    self.draining = true;
                }
            }
        }
    }

    fn deliver(&mut self, raw: RawLog) -> bool {
        match self.decoder.decode(&raw, &self.schema) {
            Ok(event) => {
                trace!(
                    event = %self.schema.name,
                    block = event.block_number(),
                    log_index = event.log_index(),
                    "decoded event"
                );
                self.current = Some(event);
                true
            }
            Err(err) => self.fail(StreamError::Decode(err)),
        }
    }

    fn fail(&mut self, err: StreamError) -> bool {
        debug!(event = %self.schema.name, error = %err, "iterator failed");
        self.error = Some(err);
        // failure is terminal even if the error is later taken
        self.exhausted = true;
        self.current = None;
        false
    }

    fn exhaust(&mut self) -> bool {
        self.exhausted = true;
        self.current = None;
        false
    }

    /// The most recently decoded event. Only meaningful immediately after
    /// an `advance` that returned `true`.
    pub fn current(&self) -> Option<&DecodedEvent> {
        self.current.as_ref()
    }

    /// Take ownership of the current event, leaving the slot empty.
    pub fn take_current(&mut self) -> Option<DecodedEvent> {
        self.current.take()
    }

    /// The terminal error, if the iterator has failed.
    pub fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    /// Take ownership of the terminal error.
    pub fn take_error(&mut self) -> Option<StreamError> {
        self.error.take()
    }

    /// Release the upstream subscription. Idempotent, callable from any
    /// state; a concurrently blocked `advance` unblocks with `false`. Does
    /// not clear a stored error — query it separately.
    pub fn close(&self) {
        self.shared.close();
    }

    /// A handle for closing this iterator from another task.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The event name this iterator decodes.
    pub fn event_name(&self) -> &str {
        &self.schema.name
    }
}

impl Drop for EventIterator {
    fn drop(&mut self) {
        // Subscription release is tied to iterator lifetime: every exit
        // path unsubscribes, not just explicit close.
        self.shared.close();
    }
}

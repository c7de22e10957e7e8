//! `EventClient` — the caller-facing surface: historical filtering, live
//! streaming/watching, and single-record decode.

use crate::backend::LogBackend;
use crate::filter::{BlockRange, LogFilter, TopicFilter};
use crate::iterator::EventIterator;
use crate::watcher::{spawn_watch, EventSink, WatchHandle};
use chainevents_core::{
    decoder::EventDecoder,
    error::{DecodeError, QueryError, StreamError},
    event::{DecodedEvent, RawLog},
    schema::{EventSchema, SchemaRegistry},
};
use std::sync::Arc;
use tracing::debug;

/// Typed access to one backend's event logs, for every schema in the
/// registry.
#[derive(Clone)]
pub struct EventClient {
    backend: Arc<dyn LogBackend>,
    registry: Arc<dyn SchemaRegistry>,
    decoder: Arc<dyn EventDecoder>,
    /// Contract addresses every filter is scoped to; empty = any contract
    addresses: Vec<String>,
}

impl EventClient {
    pub fn new(
        backend: Arc<dyn LogBackend>,
        registry: Arc<dyn SchemaRegistry>,
        decoder: Arc<dyn EventDecoder>,
    ) -> Self {
        Self {
            backend,
            registry,
            decoder,
            addresses: Vec::new(),
        }
    }

    /// Scope all filters to a contract address (can be called multiple
    /// times to match any of several contracts).
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.addresses.push(address.into());
        self
    }

    fn schema(&self, event: &str) -> Option<EventSchema> {
        self.registry.get_by_name(event)
    }

    fn build_filter(&self, schema: &EventSchema, topics: TopicFilter, range: BlockRange) -> LogFilter {
        LogFilter::for_schema(schema, self.addresses.clone(), topics, range)
    }

    /// Query a bounded window of historical events and return an iterator
    /// over them. Range and schema problems surface here, before any
    /// iterator exists.
    pub async fn filter_events(
        &self,
        event: &str,
        topics: TopicFilter,
        range: BlockRange,
    ) -> Result<EventIterator, QueryError> {
        range.validate()?;
        let schema = self.schema(event).ok_or_else(|| QueryError::UnknownEvent {
            name: event.to_string(),
        })?;
        let filter = self.build_filter(&schema, topics, range);
        let records = self.backend.query_logs(&filter).await?;
        debug!(event, count = records.len(), "historical query returned");
        Ok(EventIterator::historical(
            schema,
            Arc::clone(&self.decoder),
            records,
        ))
    }

    /// Subscribe to future events and return a live iterator over them.
    pub async fn stream_events(
        &self,
        event: &str,
        topics: TopicFilter,
    ) -> Result<EventIterator, StreamError> {
        let schema = self.schema(event).ok_or_else(|| StreamError::UnknownEvent {
            name: event.to_string(),
        })?;
        let filter = self.build_filter(&schema, topics, BlockRange::default());
        let sub = self.backend.subscribe_logs(&filter).await?;
        debug!(event, "live subscription opened");
        Ok(EventIterator::live(schema, Arc::clone(&self.decoder), sub))
    }

    /// Subscribe and forward every decoded event to `sink` until the
    /// stream ends, fails, or the returned handle is closed.
    pub async fn watch_events<S>(
        &self,
        event: &str,
        topics: TopicFilter,
        sink: S,
    ) -> Result<WatchHandle, StreamError>
    where
        S: EventSink + 'static,
    {
        let iter = self.stream_events(event, topics).await?;
        Ok(spawn_watch(iter, sink))
    }

    /// Decode a single raw log against a registered schema. No iteration,
    /// no backend call.
    pub fn parse_event(&self, raw: &RawLog, event: &str) -> Result<DecodedEvent, DecodeError> {
        let schema = self.schema(event).ok_or_else(|| DecodeError::UnknownEvent {
            name: event.to_string(),
        })?;
        self.decoder.decode(raw, &schema)
    }
}

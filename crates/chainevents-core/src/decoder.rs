//! The `EventDecoder` trait.
//!
//! Object-safe so the iterator and watch tasks can hold decoders as
//! `Arc<dyn EventDecoder>`; implementations must be `Send + Sync` because
//! one decoder is shared across Tokio tasks without additional locking.

use crate::error::DecodeError;
use crate::event::{DecodedEvent, RawLog};
use crate::schema::EventSchema;

/// Decodes one raw log against one event schema.
///
/// Implementations are pure: the same log and schema always produce the
/// same result, and a failed decode never yields a partially populated
/// event.
pub trait EventDecoder: Send + Sync {
    fn decode(&self, raw: &RawLog, schema: &EventSchema) -> Result<DecodedEvent, DecodeError>;
}

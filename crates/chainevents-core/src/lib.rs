//! # chainevents-core
//!
//! Shared primitives for ChainEvents: raw and decoded log types, the ABI
//! param type system, event schemas, the schema registry, and the
//! `EventDecoder` trait every decoder implements.

pub mod decoder;
pub mod error;
pub mod event;
pub mod registry;
pub mod schema;
pub mod types;

pub use decoder::EventDecoder;
pub use error::{DecodeError, QueryError, RegistryError, StreamError};
pub use event::{DecodedEvent, EventFingerprint, RawLog};
pub use registry::MemoryRegistry;
pub use schema::{EventParam, EventSchema, SchemaRegistry};
pub use types::{ParamType, ParamValue};

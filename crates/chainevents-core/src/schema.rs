//! Event schemas — the static description of one event's field layout.
//!
//! A schema is looked up by event name, shared read-only across iterators,
//! and never mutated at runtime.

use crate::event::EventFingerprint;
use crate::types::ParamType;
use serde::{Deserialize, Serialize};

/// One event parameter: name, type, and topic/payload placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventParam {
    pub name: String,
    pub ty: ParamType,
    /// Indexed params are carried in topic slots and are filterable by the
    /// backend; non-indexed params live in the ABI-encoded payload.
    pub indexed: bool,
}

/// A parsed event schema: ordered params plus the anonymous flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSchema {
    /// Event name, e.g. "Transfer"
    pub name: String,
    /// Anonymous events carry no leading signature topic
    #[serde(default)]
    pub anonymous: bool,
    /// Param definitions in declaration order (order matters for decode)
    pub inputs: Vec<EventParam>,
}

impl EventSchema {
    /// Canonical signature string, e.g. `"Transfer(address,address,uint256)"`.
    pub fn signature(&self) -> String {
        let types: Vec<_> = self.inputs.iter().map(|p| p.ty.to_string()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// keccak256 of the canonical signature — topics[0] for non-anonymous
    /// events. Derived on demand so it can never drift from the inputs.
    pub fn fingerprint(&self) -> EventFingerprint {
        EventFingerprint::of_signature(&self.signature())
    }

    /// Indexed params in declaration order (topic slots 1.. for named
    /// events, 0.. for anonymous ones).
    pub fn indexed_inputs(&self) -> Vec<&EventParam> {
        self.inputs.iter().filter(|p| p.indexed).collect()
    }

    /// Non-indexed params in declaration order (the payload tuple).
    pub fn data_inputs(&self) -> Vec<&EventParam> {
        self.inputs.iter().filter(|p| !p.indexed).collect()
    }

    /// Exact number of topics a matching log must carry.
    pub fn expected_topics(&self) -> usize {
        let indexed = self.inputs.iter().filter(|p| p.indexed).count();
        if self.anonymous {
            indexed
        } else {
            indexed + 1
        }
    }
}

/// A thread-safe, read-only view of registered event schemas.
/// The concrete in-memory implementation lives in [`crate::registry`].
pub trait SchemaRegistry: Send + Sync {
    /// Look up a schema by event name.
    fn get_by_name(&self, name: &str) -> Option<EventSchema>;

    /// Look up a schema by its signature fingerprint.
    fn get_by_fingerprint(&self, fp: &EventFingerprint) -> Option<EventSchema>;

    /// All registered event names, in registration order.
    fn names(&self) -> Vec<String>;
}

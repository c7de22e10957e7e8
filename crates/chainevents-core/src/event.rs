//! Raw and decoded log types.

use crate::types::ParamValue;
use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

/// A raw, undecoded log as received from an RPC node.
/// This is the input to every decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Contract address that emitted the log (hex, 0x-prefixed)
    pub address: String,
    /// topics[0] is the event signature hash for non-anonymous events;
    /// the remaining topics are indexed params (32-byte hex each)
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed params
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Originating block number
    pub block_number: u64,
    /// Originating block hash, if the node reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    /// Transaction hash
    pub tx_hash: String,
    /// Transaction index within the block
    pub tx_index: u32,
    /// Log index within the block
    pub log_index: u32,
    /// Set by the node when the log was removed in a chain reorg
    #[serde(default)]
    pub removed: bool,
}

impl RawLog {
    /// topics[0], if present.
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(|s| s.as_str())
    }

    /// The event signature fingerprint carried in topics[0].
    /// Returns `None` if topics is empty (anonymous event) or the first
    /// topic is not a well-formed 32-byte hash.
    pub fn fingerprint(&self) -> Option<EventFingerprint> {
        let first = self.topics.first()?;
        let hex = first.strip_prefix("0x").unwrap_or(first);
        if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(EventFingerprint::new(first.clone()))
        } else {
            None
        }
    }
}

/// The keccak256 hash of an event's canonical signature.
/// Used for O(1) schema lookup and topic0 filter values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventFingerprint(pub String);

impl EventFingerprint {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Compute the fingerprint of a canonical signature string,
    /// e.g. `"Transfer(address,address,uint256)"`.
    pub fn of_signature(signature: &str) -> Self {
        let mut hasher = Keccak::v256();
        let mut output = [0u8; 32];
        hasher.update(signature.as_bytes());
        hasher.finalize(&mut output);
        Self(format!("0x{}", hex::encode(output)))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully decoded event — the primary output of ChainEvents.
///
/// Fields appear in schema declaration order. The originating `RawLog` is
/// attached whole so callers keep block/transaction/log-index provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Event name, e.g. "Transfer"
    pub event: String,
    /// Decoded values in declaration order
    pub fields: Vec<(String, ParamValue)>,
    /// The raw log this event was decoded from
    pub raw: RawLog,
}

impl DecodedEvent {
    /// Look up a decoded field by name.
    pub fn field(&self, name: &str) -> Option<&ParamValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Provenance: originating block number.
    pub fn block_number(&self) -> u64 {
        self.raw.block_number
    }

    /// Provenance: originating transaction hash.
    pub fn tx_hash(&self) -> &str {
        &self.raw.tx_hash
    }

    /// Provenance: log index within the block.
    pub fn log_index(&self) -> u32 {
        self.raw.log_index
    }
}

/// Serde helper: `Vec<u8>` as a 0x-prefixed hex string.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

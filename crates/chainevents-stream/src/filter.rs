//! Filter types: what to match (event, indexed values, addresses) and
//! where to look (block range, or "from now on" for live mode).

use chainevents_core::{error::QueryError, schema::EventSchema};
use serde::{Deserialize, Serialize};

/// An inclusive historical block window. `None` ends are open: the backend
/// default is genesis / latest respectively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

impl BlockRange {
    pub fn new(from_block: impl Into<Option<u64>>, to_block: impl Into<Option<u64>>) -> Self {
        Self {
            from_block: from_block.into(),
            to_block: to_block.into(),
        }
    }

    /// Rejects an inverted range before any backend call is made.
    pub fn validate(&self) -> Result<(), QueryError> {
        if let (Some(from), Some(to)) = (self.from_block, self.to_block) {
            if from > to {
                return Err(QueryError::InvalidRange { from, to });
            }
        }
        Ok(())
    }
}

/// Per-position constraints on indexed params. Position 0 here is the
/// first indexed param (topic slot 1 for named events); EVM logs carry at
/// most three. An empty position matches anything; multiple values at one
/// position are OR-ed, as in `eth_getLogs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicFilter {
    positions: [Option<Vec<String>>; 3],
}

impl TopicFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain one indexed-param position to the given 32-byte hex
    /// topic values.
    ///
    /// # Panics
    /// If `position >= 3` — EVM logs have no fourth indexed slot.
    pub fn topic(mut self, position: usize, values: impl IntoIterator<Item = String>) -> Self {
        assert!(position < 3, "EVM logs carry at most three indexed topics");
        let values: Vec<String> = values.into_iter().collect();
        self.positions[position] = if values.is_empty() { None } else { Some(values) };
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positions.iter().all(|p| p.is_none())
    }

    pub(crate) fn positions(&self) -> &[Option<Vec<String>>; 3] {
        &self.positions
    }
}

/// The fully-built filter handed to the backend: schema-derived topic0
/// plus the caller's constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Contract addresses to match; empty = any contract
    pub addresses: Vec<String>,
    /// topics[0] constraint — the event signature hash; `None` for
    /// anonymous events, which have no signature topic to match
    pub topic0: Option<String>,
    /// Indexed-param constraints (topic slots 1..=3)
    pub topics: TopicFilter,
    /// Historical window; ignored by live subscriptions
    pub range: BlockRange,
}

impl LogFilter {
    /// Build the backend filter for a schema: topic0 pinned to the event's
    /// fingerprint for named events.
    pub fn for_schema(
        schema: &EventSchema,
        addresses: Vec<String>,
        topics: TopicFilter,
        range: BlockRange,
    ) -> Self {
        let topic0 = if schema.anonymous {
            None
        } else {
            Some(schema.fingerprint().as_hex().to_string())
        };
        Self {
            addresses,
            topic0,
            topics,
            range,
        }
    }
}

//! `EvmEventDecoder` — the EventDecoder implementation for EVM logs.
//!
//! Decoding is strict: the log's topic count and payload must match the
//! schema exactly, or the whole record is rejected. A decode never returns
//! a partially populated event.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use chainevents_core::{
    decoder::EventDecoder,
    error::DecodeError,
    event::{DecodedEvent, RawLog},
    schema::{EventParam, EventSchema},
    types::{ParamType, ParamValue},
};

use crate::normalizer;

/// The EVM log decoder. Stateless, cheap to clone.
#[derive(Debug, Default, Clone)]
pub struct EvmEventDecoder;

impl EvmEventDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Build the alloy `DynSolType` for a `ParamType`. Total: every
    /// ChainEvents param type has an EVM ABI representation.
    fn to_dyn(ty: &ParamType) -> DynSolType {
        match ty {
            ParamType::Uint(bits) => DynSolType::Uint(*bits as usize),
            ParamType::Int(bits) => DynSolType::Int(*bits as usize),
            ParamType::Bool => DynSolType::Bool,
            ParamType::FixedBytes(n) => DynSolType::FixedBytes(*n as usize),
            ParamType::Bytes => DynSolType::Bytes,
            ParamType::String => DynSolType::String,
            ParamType::Address => DynSolType::Address,
            ParamType::FixedArray { elem, len } => {
                DynSolType::FixedArray(Box::new(Self::to_dyn(elem)), *len as usize)
            }
            ParamType::Array(elem) => DynSolType::Array(Box::new(Self::to_dyn(elem))),
            ParamType::Tuple(elems) => {
                DynSolType::Tuple(elems.iter().map(Self::to_dyn).collect())
            }
        }
    }

    /// Decode one indexed topic (always exactly 32 bytes).
    ///
    /// Value types (uint, int, bool, address, bytesN) are ABI-encoded into
    /// the slot and recoverable. Reference types (string, bytes, arrays,
    /// tuples) are stored as the keccak256 of their encoding — the original
    /// value is unrecoverable, so the raw 32-byte hash is surfaced.
    fn decode_topic(
        &self,
        position: usize,
        topic_hex: &str,
        ty: &ParamType,
    ) -> Result<ParamValue, DecodeError> {
        let stripped = topic_hex.strip_prefix("0x").unwrap_or(topic_hex);
        let bytes = hex::decode(stripped).map_err(|e| DecodeError::InvalidTopic {
            position,
            reason: format!("invalid hex: {e}"),
        })?;
        if bytes.len() != 32 {
            return Err(DecodeError::InvalidTopic {
                position,
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            });
        }

        if !ty.is_value_type() {
            return Ok(ParamValue::FixedBytes(bytes));
        }

        match Self::to_dyn(ty).abi_decode(&bytes) {
            Ok(val) => Ok(normalizer::from_dyn(val)),
            Err(e) => Err(DecodeError::InvalidTopic {
                position,
                reason: e.to_string(),
            }),
        }
    }

    /// Decode the payload (non-indexed params) as an ABI-encoded tuple,
    /// returning (name, value) pairs in data-field declaration order.
    fn decode_payload(
        &self,
        schema: &EventSchema,
        data_inputs: &[&EventParam],
        data: &[u8],
    ) -> Result<Vec<(String, ParamValue)>, DecodeError> {
        if data_inputs.is_empty() {
            return if data.is_empty() {
                Ok(Vec::new())
            } else {
                Err(DecodeError::PayloadMismatch {
                    event: schema.name.clone(),
                    reason: format!("{} unexpected payload bytes", data.len()),
                })
            };
        }

        let tuple_ty =
            DynSolType::Tuple(data_inputs.iter().map(|p| Self::to_dyn(&p.ty)).collect());
        let decoded = tuple_ty
            .abi_decode(data)
            .map_err(|e| DecodeError::PayloadMismatch {
                event: schema.name.clone(),
                reason: e.to_string(),
            })?;

        let values = match decoded {
            DynSolValue::Tuple(vals) => vals,
            other => vec![other],
        };
        if values.len() != data_inputs.len() {
            return Err(DecodeError::PayloadMismatch {
                event: schema.name.clone(),
                reason: format!(
                    "expected {} payload values, got {}",
                    data_inputs.len(),
                    values.len()
                ),
            });
        }

        Ok(data_inputs
            .iter()
            .zip(values)
            .map(|(p, v)| (p.name.clone(), normalizer::from_dyn(v)))
            .collect())
    }
}

impl EventDecoder for EvmEventDecoder {
    fn decode(&self, raw: &RawLog, schema: &EventSchema) -> Result<DecodedEvent, DecodeError> {
        let expected = schema.expected_topics();
        if raw.topics.len() != expected {
            return Err(DecodeError::TopicCountMismatch {
                event: schema.name.clone(),
                expected,
                got: raw.topics.len(),
            });
        }

        if !schema.anonymous {
            let fingerprint = schema.fingerprint();
            // topic count check guarantees topics[0] exists here
            let topic0 = raw.topic0().unwrap_or("");
            if !topic0.eq_ignore_ascii_case(fingerprint.as_hex()) {
                return Err(DecodeError::SignatureMismatch {
                    expected: fingerprint.as_hex().to_string(),
                    got: topic0.to_string(),
                });
            }
        }

        let topic_base = usize::from(!schema.anonymous);
        let data_inputs = schema.data_inputs();
        let mut payload = self
            .decode_payload(schema, &data_inputs, &raw.data)?
            .into_iter();

        // Interleave topics and payload values back into declaration order.
        let mut topic_pos = topic_base;
        let mut fields = Vec::with_capacity(schema.inputs.len());
        for param in &schema.inputs {
            if param.indexed {
                let Some(topic) = raw.topics.get(topic_pos) else {
                    return Err(DecodeError::TopicCountMismatch {
                        event: schema.name.clone(),
                        expected,
                        got: raw.topics.len(),
                    });
                };
                let value = self.decode_topic(topic_pos, topic, &param.ty)?;
                topic_pos += 1;
                fields.push((param.name.clone(), value));
            } else {
                let Some((name, value)) = payload.next() else {
                    return Err(DecodeError::PayloadMismatch {
                        event: schema.name.clone(),
                        reason: "fewer payload values than declared".into(),
                    });
                };
                fields.push((name, value));
            }
        }

        Ok(DecodedEvent {
            event: schema.name.clone(),
            fields,
            raw: raw.clone(),
        })
    }
}

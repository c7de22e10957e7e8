//! The ABI param type system.
//!
//! `ParamType` describes one event parameter's Solidity type; `ParamValue`
//! is the decoded value. Types display as (and parse from) canonical
//! Solidity type strings, so ABI JSON `type` fields and event signature
//! strings round-trip through them.

use alloy_primitives::{Address, I256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A Solidity ABI parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Unsigned integer (uint8 .. uint256). Width in bits.
    Uint(u16),
    /// Signed integer (int8 .. int256). Width in bits.
    Int(u16),
    Bool,
    /// Fixed-size byte array (bytes1 .. bytes32). Length in bytes.
    FixedBytes(u8),
    /// Variable-length byte array
    Bytes,
    /// UTF-8 string
    String,
    /// 20-byte EVM address
    Address,
    /// Fixed-length array of a type
    FixedArray { elem: Box<ParamType>, len: u64 },
    /// Variable-length array of a type
    Array(Box<ParamType>),
    /// Tuple / struct
    Tuple(Vec<ParamType>),
}

impl ParamType {
    /// Returns `true` for value types: the types that are stored verbatim
    /// (left- or right-padded to 32 bytes) in an indexed topic slot.
    /// Everything else is keccak-hashed in indexed position and cannot be
    /// recovered from the topic.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            ParamType::Uint(_)
                | ParamType::Int(_)
                | ParamType::Bool
                | ParamType::FixedBytes(_)
                | ParamType::Address
        )
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Uint(bits) => write!(f, "uint{bits}"),
            ParamType::Int(bits) => write!(f, "int{bits}"),
            ParamType::Bool => write!(f, "bool"),
            ParamType::FixedBytes(n) => write!(f, "bytes{n}"),
            ParamType::Bytes => write!(f, "bytes"),
            ParamType::String => write!(f, "string"),
            ParamType::Address => write!(f, "address"),
            ParamType::FixedArray { elem, len } => write!(f, "{elem}[{len}]"),
            ParamType::Array(elem) => write!(f, "{elem}[]"),
            ParamType::Tuple(elems) => {
                let parts: Vec<_> = elems.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", parts.join(","))
            }
        }
    }
}

/// Error parsing a Solidity type string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid type string '{0}'")]
pub struct ParseTypeError(pub String);

impl FromStr for ParamType {
    type Err = ParseTypeError;

    /// Parse a canonical Solidity type string, e.g. `uint256`, `bytes32`,
    /// `address[]`, `uint8[4]`, `(uint256,address)[]`.
    ///
    /// The bare `tuple` keyword from ABI JSON is rejected — tuples must be
    /// resolved from their `components` (see `chainevents-evm`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseTypeError(s.into()));
        }

        // Array suffixes bind last: peel them off from the right.
        if let Some(stripped) = s.strip_suffix(']') {
            let open = stripped.rfind('[').ok_or_else(|| ParseTypeError(s.into()))?;
            let elem = Box::new(stripped[..open].parse()?);
            let len_str = &stripped[open + 1..];
            return if len_str.is_empty() {
                Ok(ParamType::Array(elem))
            } else {
                let len: u64 = len_str
                    .parse()
                    .map_err(|_| ParseTypeError(s.into()))?;
                Ok(ParamType::FixedArray { elem, len })
            };
        }

        // Parenthesized tuple: split on top-level commas.
        if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            if inner.is_empty() {
                return Ok(ParamType::Tuple(Vec::new()));
            }
            let mut elems = Vec::new();
            let mut depth = 0usize;
            let mut start = 0usize;
            for (i, c) in inner.char_indices() {
                match c {
                    '(' => depth += 1,
                    ')' => depth = depth.checked_sub(1).ok_or_else(|| ParseTypeError(s.into()))?,
                    ',' if depth == 0 => {
                        elems.push(inner[start..i].parse()?);
                        start = i + 1;
                    }
                    _ => {}
                }
            }
            if depth != 0 {
                return Err(ParseTypeError(s.into()));
            }
            elems.push(inner[start..].parse()?);
            return Ok(ParamType::Tuple(elems));
        }

        match s {
            "address" => return Ok(ParamType::Address),
            "bool" => return Ok(ParamType::Bool),
            "string" => return Ok(ParamType::String),
            "bytes" => return Ok(ParamType::Bytes),
            "uint" => return Ok(ParamType::Uint(256)),
            "int" => return Ok(ParamType::Int(256)),
            _ => {}
        }

        if let Some(n) = s.strip_prefix("bytes") {
            let n: u8 = n.parse().map_err(|_| ParseTypeError(s.into()))?;
            if (1..=32).contains(&n) {
                return Ok(ParamType::FixedBytes(n));
            }
        } else if let Some(bits) = s.strip_prefix("uint") {
            let bits: u16 = bits.parse().map_err(|_| ParseTypeError(s.into()))?;
            if bits % 8 == 0 && (8..=256).contains(&bits) {
                return Ok(ParamType::Uint(bits));
            }
        } else if let Some(bits) = s.strip_prefix("int") {
            let bits: u16 = bits.parse().map_err(|_| ParseTypeError(s.into()))?;
            if bits % 8 == 0 && (8..=256).contains(&bits) {
                return Ok(ParamType::Int(bits));
            }
        }

        Err(ParseTypeError(s.into()))
    }
}

/// A decoded event parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Uint(U256),
    Int(I256),
    Bool(bool),
    /// bytes1 .. bytes32, stored at declared width
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Address(Address),
    Array(Vec<ParamValue>),
    Tuple(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            ParamValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<I256> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            ParamValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// Inner bytes for both fixed- and variable-length byte values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ParamValue::FixedBytes(b) | ParamValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Uint(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::FixedBytes(b) | ParamValue::Bytes(b) => {
                write!(f, "0x{}", hex::encode(b))
            }
            ParamValue::String(s) => write!(f, "{s}"),
            ParamValue::Address(a) => write!(f, "{a}"),
            ParamValue::Array(vals) => {
                let parts: Vec<_> = vals.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            ParamValue::Tuple(vals) => {
                let parts: Vec<_> = vals.iter().map(|v| v.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_canonical() {
        assert_eq!(ParamType::Uint(256).to_string(), "uint256");
        assert_eq!(ParamType::FixedBytes(32).to_string(), "bytes32");
        assert_eq!(
            ParamType::Array(Box::new(ParamType::Address)).to_string(),
            "address[]"
        );
        assert_eq!(
            ParamType::Tuple(vec![ParamType::Uint(256), ParamType::Address]).to_string(),
            "(uint256,address)"
        );
    }

    #[test]
    fn parse_elementary() {
        assert_eq!("uint256".parse(), Ok(ParamType::Uint(256)));
        assert_eq!("int24".parse(), Ok(ParamType::Int(24)));
        assert_eq!("bytes32".parse(), Ok(ParamType::FixedBytes(32)));
        assert_eq!("bytes".parse(), Ok(ParamType::Bytes));
        assert_eq!("address".parse(), Ok(ParamType::Address));
        // bare uint/int are 256-bit aliases
        assert_eq!("uint".parse(), Ok(ParamType::Uint(256)));
    }

    #[test]
    fn parse_arrays() {
        assert_eq!(
            "address[]".parse(),
            Ok(ParamType::Array(Box::new(ParamType::Address)))
        );
        assert_eq!(
            "uint8[4]".parse(),
            Ok(ParamType::FixedArray {
                elem: Box::new(ParamType::Uint(8)),
                len: 4
            })
        );
        // nested: array-of-fixed-array
        assert_eq!(
            "uint256[2][]".parse(),
            Ok(ParamType::Array(Box::new(ParamType::FixedArray {
                elem: Box::new(ParamType::Uint(256)),
                len: 2
            })))
        );
    }

    #[test]
    fn parse_tuples() {
        assert_eq!(
            "(uint256,address)".parse(),
            Ok(ParamType::Tuple(vec![
                ParamType::Uint(256),
                ParamType::Address
            ]))
        );
        assert_eq!(
            "(uint8[2],bool)[]".parse(),
            Ok(ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::FixedArray {
                    elem: Box::new(ParamType::Uint(8)),
                    len: 2
                },
                ParamType::Bool
            ]))))
        );
    }

    #[test]
    fn parse_rejects_invalid() {
        assert!("uint7".parse::<ParamType>().is_err());
        assert!("uint512".parse::<ParamType>().is_err());
        assert!("bytes33".parse::<ParamType>().is_err());
        assert!("tuple".parse::<ParamType>().is_err());
        assert!("".parse::<ParamType>().is_err());
        assert!("uint256[".parse::<ParamType>().is_err());
    }

    #[test]
    fn display_parse_roundtrip() {
        for s in ["uint256", "int128", "bool", "bytes4", "string", "address[]", "(uint256,bytes32)[3]"] {
            let ty: ParamType = s.parse().unwrap();
            assert_eq!(ty.to_string(), s);
        }
    }

    #[test]
    fn value_types_for_topics() {
        assert!(ParamType::Address.is_value_type());
        assert!(ParamType::FixedBytes(32).is_value_type());
        assert!(!ParamType::String.is_value_type());
        assert!(!ParamType::Bytes.is_value_type());
        // fixed arrays of value types are still hashed in topics
        assert!(!ParamType::FixedArray {
            elem: Box::new(ParamType::Uint(8)),
            len: 2
        }
        .is_value_type());
    }

    #[test]
    fn value_serde_roundtrip() {
        let val = ParamValue::Uint(U256::from(1_000_000_000u64));
        let json = serde_json::to_string(&val).unwrap();
        let back: ParamValue = serde_json::from_str(&json).unwrap();
        assert_eq!(val, back);
    }
}

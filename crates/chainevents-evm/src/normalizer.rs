//! Converts alloy-core `DynSolValue` → ChainEvents `ParamValue`.

use alloy_core::dyn_abi::DynSolValue;
use chainevents_core::types::ParamValue;

/// Convert a decoded `DynSolValue` into a `ParamValue`.
///
/// Numeric values pass through as `U256`/`I256`; fixed bytes are truncated
/// to their declared width (alloy stores them left-aligned in a full word).
pub fn from_dyn(val: DynSolValue) -> ParamValue {
    match val {
        DynSolValue::Bool(b) => ParamValue::Bool(b),
        DynSolValue::Int(i, _) => ParamValue::Int(i),
        DynSolValue::Uint(u, _) => ParamValue::Uint(u),
        DynSolValue::FixedBytes(word, size) => ParamValue::FixedBytes(word[..size].to_vec()),
        DynSolValue::Bytes(b) => ParamValue::Bytes(b),
        DynSolValue::String(s) => ParamValue::String(s),
        DynSolValue::Address(a) => ParamValue::Address(a),
        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            ParamValue::Array(vals.into_iter().map(from_dyn).collect())
        }
        DynSolValue::Tuple(vals) => ParamValue::Tuple(vals.into_iter().map(from_dyn).collect()),
        // Function selectors (20-byte address + 4-byte selector) — raw bytes
        DynSolValue::Function(f) => ParamValue::FixedBytes(f.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, FixedBytes, I256, U256};

    #[test]
    fn uint_passes_through() {
        let big = (U256::from(1u8) << 200) + U256::from(7u8);
        let v = from_dyn(DynSolValue::Uint(big, 256));
        assert_eq!(v, ParamValue::Uint(big));
    }

    #[test]
    fn int_negative() {
        let v = from_dyn(DynSolValue::Int(I256::try_from(-42i64).unwrap(), 256));
        assert_eq!(v, ParamValue::Int(I256::try_from(-42i64).unwrap()));
    }

    #[test]
    fn fixed_bytes_truncated_to_width() {
        let mut word = [0u8; 32];
        word[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let v = from_dyn(DynSolValue::FixedBytes(FixedBytes::from(word), 4));
        assert_eq!(v, ParamValue::FixedBytes(vec![0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn address_typed() {
        let addr: Address = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap();
        let v = from_dyn(DynSolValue::Address(addr));
        assert_eq!(v.as_address(), Some(addr));
    }

    #[test]
    fn nested_array() {
        let vals = vec![
            DynSolValue::Uint(U256::from(1u8), 256),
            DynSolValue::Uint(U256::from(2u8), 256),
        ];
        let v = from_dyn(DynSolValue::Array(vals));
        match v {
            ParamValue::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected Array, got {other:?}"),
        }
    }
}

// Path: crates/types/src/codec.rs

//! Defines the canonical, deterministic binary codec for all consensus-critical state.
//!
//! This module provides simple wrappers around `parity-scale-codec` (SCALE).
//! By centralizing the codec logic here in the base `types` crate, we ensure
//! that every component uses the exact same serialization format for state,
//! hashing and the undo log, preventing consensus failures due to different
//! binary representations of the same data.

use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into a deterministic, canonical byte representation.
///
/// This function should be used for all data that is written to
/// consensus-critical state or is included in a hash for signing or replay
/// protection.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Result<Vec<u8>, String> {
    Ok(v.encode())
}

/// Decodes a value from a canonical byte representation.
///
/// This function fails fast on any decoding error, returning a descriptive
/// string. Trailing bytes are rejected, which is critical for preventing
/// malleable encodings from entering a consensus context.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Encode, Decode, Debug, PartialEq, Eq)]
    struct TestStruct {
        id: u64,
        name: String,
        slate: i64,
    }

    #[test]
    fn test_canonical_codec_roundtrip() {
        let original = TestStruct {
            id: 42,
            name: "init0".to_string(),
            slate: -7,
        };

        let encoded = to_bytes_canonical(&original).unwrap();
        assert!(!encoded.is_empty());

        let decoded = from_bytes_canonical::<TestStruct>(&encoded).unwrap();
        assert_eq!(original, decoded);

        // Maps must roundtrip in deterministic key order.
        let mut original_map = BTreeMap::new();
        original_map.insert([2u8; 20], 5i64);
        original_map.insert([1u8; 20], -5i64);

        let encoded_map = to_bytes_canonical(&original_map).unwrap();
        let decoded_map = from_bytes_canonical::<BTreeMap<[u8; 20], i64>>(&encoded_map).unwrap();
        assert_eq!(original_map, decoded_map);
    }

    #[test]
    fn test_canonical_decode_rejects_trailing_bytes() {
        let original = TestStruct {
            id: 99,
            name: "tail".to_string(),
            slate: 0,
        };

        let mut encoded = to_bytes_canonical(&original).unwrap();
        encoded.push(0xFF);

        let result = from_bytes_canonical::<TestStruct>(&encoded);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("canonical decode failed"));
    }
}

use crate::error::CoreError;

/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash of an empty subtree.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Third child of every leaf node, distinguishing leaves from middle nodes.
pub const LEAF_MARKER: Hash = {
    let mut marker = [0u8; 32];
    marker[0] = 1;
    marker
};

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Hash an ordered list of field elements.
///
/// The element count is mixed in first so that a two-child middle node can
/// never collide with a three-child leaf or state node.
pub fn hash_elems(elems: &[Hash]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[elems.len() as u8]);
    for elem in elems {
        hasher.update(elem);
    }
    *hasher.finalize().as_bytes()
}

/// Encode a `u64` as a little-endian tree key.
pub fn key_from_u64(value: u64) -> Hash {
    let mut key = ZERO_HASH;
    key[..8].copy_from_slice(&value.to_le_bytes());
    key
}

/// Lowercase hex rendering of a hash.
pub fn to_hex(h: &Hash) -> String {
    hex::encode(h)
}

/// Parse a 32-byte hash from hex, with or without a `0x` prefix.
pub fn from_hex(s: &str) -> Result<Hash, CoreError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| CoreError::InvalidHash(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| CoreError::InvalidHash(format!("expected 32 bytes, got {}", b.len())))
}

/// Serde adapter rendering a [`Hash`] as a hex string.
pub mod serde_hash {
    use super::{from_hex, to_hex, Hash};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(h: &Hash, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&to_hex(h))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(d)?;
        from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter rendering a list of hashes as hex strings.
pub mod serde_hashes {
    use super::{from_hex, to_hex, Hash};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hashes: &[Hash], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(hashes.iter().map(to_hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Hash>, D::Error> {
        let raw = Vec::<String>::deserialize(d)?;
        raw.iter()
            .map(|s| from_hex(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"Sigil test data";
        assert_eq!(hash(data), hash(data));
    }

    #[test]
    fn test_hash_different_inputs() {
        assert_ne!(hash(b"data A"), hash(b"data B"));
    }

    #[test]
    fn test_hash_elems_arity_separated() {
        let a = hash(b"a");
        let b = hash(b"b");
        // [a, b] and [a, b, 0] must not collide even though the trailing
        // element is all zeroes.
        assert_ne!(hash_elems(&[a, b]), hash_elems(&[a, b, ZERO_HASH]));
    }

    #[test]
    fn test_hash_elems_order_matters() {
        let a = hash(b"A");
        let b = hash(b"B");
        assert_ne!(hash_elems(&[a, b]), hash_elems(&[b, a]));
    }

    #[test]
    fn test_key_from_u64() {
        let key = key_from_u64(0x0102);
        assert_eq!(key[0], 0x02);
        assert_eq!(key[1], 0x01);
        assert!(key[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = hash(b"hex");
        assert_eq!(from_hex(&to_hex(&h)).unwrap(), h);
        assert_eq!(from_hex(&format!("0x{}", to_hex(&h))).unwrap(), h);
    }

    #[test]
    fn test_from_hex_wrong_length() {
        assert!(from_hex("abcd").is_err());
        assert!(from_hex("zz").is_err());
    }
}

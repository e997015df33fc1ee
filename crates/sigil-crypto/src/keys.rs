use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CryptoError;

/// Key types a provider can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KmsKeyType {
    /// Baby JubJub twisted Edwards curve over the BN254 scalar field.
    #[serde(rename = "BJJ")]
    BabyJubJub,
    #[serde(rename = "ED25519")]
    Ed25519,
}

impl KmsKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BabyJubJub => "BJJ",
            Self::Ed25519 => "ED25519",
        }
    }
}

impl fmt::Display for KmsKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KmsKeyType {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BJJ" => Ok(Self::BabyJubJub),
            "ED25519" => Ok(Self::Ed25519),
            other => Err(CryptoError::UnsupportedKeyType(other.to_string())),
        }
    }
}

/// Opaque key handle: `<TYPE>:<hex public key>`.
///
/// Distinct keys never share a handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub key_type: KmsKeyType,
    pub id: String,
}

impl KeyId {
    pub fn new(key_type: KmsKeyType, public_key: &[u8]) -> Self {
        Self {
            key_type,
            id: hex::encode(public_key),
        }
    }

    pub fn parse(s: &str) -> Result<Self, CryptoError> {
        let (t, id) = s
            .split_once(':')
            .ok_or_else(|| CryptoError::InvalidKeyId(s.to_string()))?;
        if id.is_empty() || hex::decode(id).is_err() {
            return Err(CryptoError::InvalidKeyId(s.to_string()));
        }
        Ok(Self {
            key_type: t.parse()?,
            id: id.to_string(),
        })
    }

    /// Raw public key bytes carried in the handle.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        hex::decode(&self.id).map_err(|_| CryptoError::InvalidKeyId(self.to_string()))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key_type, self.id)
    }
}

impl Serialize for KeyId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

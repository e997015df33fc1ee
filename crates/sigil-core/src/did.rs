use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::hash::{hash_elems, key_from_u64, Hash};

/// Length of an identity id: type (2) ‖ genesis (27) ‖ checksum (2).
pub const ID_LENGTH: usize = 31;
const GENESIS_LENGTH: usize = 27;

/// DID method names understood by Sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DidMethod {
    Iden3,
    PolygonId,
}

impl DidMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iden3 => "iden3",
            Self::PolygonId => "polygonid",
        }
    }

    fn type_byte(&self) -> u8 {
        match self {
            Self::Iden3 => 0x01,
            Self::PolygonId => 0x02,
        }
    }

    fn from_type_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Iden3),
            0x02 => Some(Self::PolygonId),
            _ => None,
        }
    }
}

impl FromStr for DidMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iden3" => Ok(Self::Iden3),
            "polygonid" => Ok(Self::PolygonId),
            other => Err(CoreError::InvalidDid(format!("unknown DID method: {}", other))),
        }
    }
}

impl fmt::Display for DidMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blockchain hosting the identity state contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Blockchain {
    Ethereum,
    Polygon,
}

impl Blockchain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Polygon => "polygon",
        }
    }
}

impl FromStr for Blockchain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ethereum" => Ok(Self::Ethereum),
            "polygon" => Ok(Self::Polygon),
            other => Err(CoreError::InvalidDid(format!("unknown blockchain: {}", other))),
        }
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network of a blockchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Main,
    Mumbai,
    Amoy,
    Goerli,
    Sepolia,
}

impl NetworkId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Mumbai => "mumbai",
            Self::Amoy => "amoy",
            Self::Goerli => "goerli",
            Self::Sepolia => "sepolia",
        }
    }
}

impl FromStr for NetworkId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "mumbai" => Ok(Self::Mumbai),
            "amoy" => Ok(Self::Amoy),
            "goerli" => Ok(Self::Goerli),
            "sepolia" => Ok(Self::Sepolia),
            other => Err(CoreError::InvalidDid(format!("unknown network: {}", other))),
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported (blockchain, network) pairs and their type byte.
const NETWORKS: &[(Blockchain, NetworkId, u8)] = &[
    (Blockchain::Polygon, NetworkId::Main, 0x11),
    (Blockchain::Polygon, NetworkId::Mumbai, 0x12),
    (Blockchain::Polygon, NetworkId::Amoy, 0x13),
    (Blockchain::Ethereum, NetworkId::Main, 0x21),
    (Blockchain::Ethereum, NetworkId::Goerli, 0x22),
    (Blockchain::Ethereum, NetworkId::Sepolia, 0x23),
];

fn network_byte(blockchain: Blockchain, network: NetworkId) -> Result<u8, CoreError> {
    NETWORKS
        .iter()
        .find(|(b, n, _)| *b == blockchain && *n == network)
        .map(|(_, _, byte)| *byte)
        .ok_or_else(|| CoreError::UnsupportedNetwork {
            blockchain: blockchain.to_string(),
            network: network.to_string(),
        })
}

fn network_from_byte(byte: u8) -> Option<(Blockchain, NetworkId)> {
    NETWORKS
        .iter()
        .find(|(_, _, b)| *b == byte)
        .map(|(chain, net, _)| (*chain, *net))
}

/// Identity identifier: 2 type bytes, 27 bytes of genesis state, 2 checksum bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityId([u8; ID_LENGTH]);

impl IdentityId {
    /// Derive an id from a DID type and an identity state.
    ///
    /// The genesis part is the trailing 27 bytes of the state.
    pub fn from_genesis(did_type: [u8; 2], state: &Hash) -> Self {
        let mut bytes = [0u8; ID_LENGTH];
        bytes[..2].copy_from_slice(&did_type);
        bytes[2..2 + GENESIS_LENGTH].copy_from_slice(&state[32 - GENESIS_LENGTH..]);
        let checksum = checksum(&bytes[..2 + GENESIS_LENGTH]);
        bytes[2 + GENESIS_LENGTH..].copy_from_slice(&checksum.to_le_bytes());
        Self(bytes)
    }

    /// Parse raw bytes, verifying the checksum.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; ID_LENGTH] = bytes.try_into().map_err(|_| {
            CoreError::InvalidId(format!("expected {} bytes, got {}", ID_LENGTH, bytes.len()))
        })?;
        let expected = checksum(&arr[..2 + GENESIS_LENGTH]);
        let actual = u16::from_le_bytes([arr[ID_LENGTH - 2], arr[ID_LENGTH - 1]]);
        if expected != actual {
            return Err(CoreError::InvalidId("checksum mismatch".into()));
        }
        Ok(Self(arr))
    }

    /// Decode from base58.
    pub fn from_base58(s: &str) -> Result<Self, CoreError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| CoreError::InvalidId(format!("invalid base58: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
        &self.0
    }

    pub fn did_type(&self) -> [u8; 2] {
        [self.0[0], self.0[1]]
    }

    /// The id padded to a 32-byte field element.
    pub fn to_hash(&self) -> Hash {
        let mut out = [0u8; 32];
        out[..ID_LENGTH].copy_from_slice(&self.0);
        out
    }
}

impl fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityId({})", self.to_base58())
    }
}

fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, b| acc.wrapping_add(*b as u16))
}

/// Decentralized identifier: `did:<method>:<blockchain>:<network>:<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Did {
    pub method: DidMethod,
    pub blockchain: Blockchain,
    pub network: NetworkId,
    pub id: IdentityId,
}

impl Did {
    /// Derive a DID from its genesis identity state.
    pub fn from_genesis_state(
        method: DidMethod,
        blockchain: Blockchain,
        network: NetworkId,
        state: &Hash,
    ) -> Result<Self, CoreError> {
        let did_type = [method.type_byte(), network_byte(blockchain, network)?];
        Ok(Self {
            method,
            blockchain,
            network,
            id: IdentityId::from_genesis(did_type, state),
        })
    }

    /// Parse a DID URI, checking prefix, network pair and id checksum.
    pub fn parse(uri: &str) -> Result<Self, CoreError> {
        let parts: Vec<&str> = uri.split(':').collect();
        if parts.len() != 5 || parts[0] != "did" {
            return Err(CoreError::InvalidDid(format!(
                "DID must have format 'did:<method>:<blockchain>:<network>:<id>', got: {}",
                uri
            )));
        }
        let method: DidMethod = parts[1].parse()?;
        let blockchain: Blockchain = parts[2].parse()?;
        let network: NetworkId = parts[3].parse()?;
        let id = IdentityId::from_base58(parts[4])?;

        let [type_method, type_network] = id.did_type();
        let id_method = DidMethod::from_type_byte(type_method);
        let id_network = network_from_byte(type_network);
        if id_method != Some(method) || id_network != Some((blockchain, network)) {
            return Err(CoreError::InvalidDid(format!(
                "id type does not match DID prefix: {}",
                uri
            )));
        }

        Ok(Self {
            method,
            blockchain,
            network,
            id,
        })
    }

    /// Whether `state` is the genesis state this DID was derived from.
    pub fn is_genesis_state(&self, state: &Hash) -> bool {
        IdentityId::from_genesis(self.id.did_type(), state) == self.id
    }

    /// Derive a profile DID for this identity.
    pub fn profile(&self, nonce: u64) -> Self {
        let profile_state = hash_elems(&[self.id.to_hash(), key_from_u64(nonce)]);
        Self {
            id: IdentityId::from_genesis(self.id.did_type(), &profile_state),
            ..*self
        }
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "did:{}:{}:{}:{}",
            self.method,
            self.blockchain,
            self.network,
            self.id.to_base58()
        )
    }
}

impl FromStr for Did {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

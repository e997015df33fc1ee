use crate::did::{IdentityId, ID_LENGTH};
use crate::error::CoreError;
use crate::hash::{hash, hash_elems, Hash, ZERO_HASH};

/// Serialized claim size: eight 32-byte slots.
pub const CLAIM_BYTES: usize = 8 * 32;

const FLAG_SUBJECT: u8 = 0b01;
const FLAG_EXPIRATION: u8 = 0b10;

/// Schema hash of authentication claims binding a BabyJubJub key.
pub fn auth_schema_hash() -> [u8; 16] {
    schema_hash("https://schema.iden3.io/core/json-ld/auth.jsonld#AuthBJJCredential")
}

/// 16-byte schema hash of `<schema url>#<type>`.
pub fn schema_hash(schema_ref: &str) -> [u8; 16] {
    let full = hash(schema_ref.as_bytes());
    let mut out = [0u8; 16];
    out.copy_from_slice(&full[..16]);
    out
}

/// Schema hash of `credential_type` as defined by the schema at `schema_url`.
pub fn credential_schema_hash(schema_url: &str, credential_type: &str) -> [u8; 16] {
    schema_hash(&format!("{}#{}", schema_url, credential_type))
}

/// Hash committing a credential subject's attributes, excluding its `id`.
///
/// Keys are serialized in sorted order so the hash does not depend on the
/// order the attributes were supplied in.
pub fn subject_data_hash(
    subject: &serde_json::Map<String, serde_json::Value>,
) -> Result<Hash, CoreError> {
    let attributes: std::collections::BTreeMap<&String, &serde_json::Value> =
        subject.iter().filter(|(k, _)| k.as_str() != "id").collect();
    Ok(hash(&serde_json::to_vec(&attributes)?))
}

/// Core claim committed into an identity's claims tree.
///
/// Index slots: header (schema hash + flags), subject, two data slots.
/// Value slots: revocation nonce/version/expiration, reserved, two data slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub schema_hash: [u8; 16],
    pub subject: Option<IdentityId>,
    pub revocation_nonce: u64,
    pub version: u32,
    pub expiration: Option<i64>,
    pub index_data: [Hash; 2],
    pub value_data: [Hash; 2],
}

impl Claim {
    pub fn new(schema_hash: [u8; 16]) -> Self {
        Self {
            schema_hash,
            subject: None,
            revocation_nonce: 0,
            version: 0,
            expiration: None,
            index_data: [ZERO_HASH; 2],
            value_data: [ZERO_HASH; 2],
        }
    }

    pub fn with_subject(mut self, subject: IdentityId) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_revocation_nonce(mut self, nonce: u64) -> Self {
        self.revocation_nonce = nonce;
        self
    }

    pub fn with_expiration(mut self, unix_seconds: i64) -> Self {
        self.expiration = Some(unix_seconds);
        self
    }

    pub fn with_index_data(mut self, a: Hash, b: Hash) -> Self {
        self.index_data = [a, b];
        self
    }

    pub fn with_value_data(mut self, a: Hash, b: Hash) -> Self {
        self.value_data = [a, b];
        self
    }

    fn index_slots(&self) -> [Hash; 4] {
        let mut header = ZERO_HASH;
        header[..16].copy_from_slice(&self.schema_hash);
        let mut flags = 0u8;
        if self.subject.is_some() {
            flags |= FLAG_SUBJECT;
        }
        if self.expiration.is_some() {
            flags |= FLAG_EXPIRATION;
        }
        header[16] = flags;

        let subject = self.subject.map(|id| id.to_hash()).unwrap_or(ZERO_HASH);
        [header, subject, self.index_data[0], self.index_data[1]]
    }

    fn value_slots(&self) -> [Hash; 4] {
        let mut meta = ZERO_HASH;
        meta[..8].copy_from_slice(&self.revocation_nonce.to_le_bytes());
        meta[8..12].copy_from_slice(&self.version.to_le_bytes());
        meta[12..20].copy_from_slice(&self.expiration.unwrap_or(0).to_le_bytes());
        [meta, ZERO_HASH, self.value_data[0], self.value_data[1]]
    }

    /// Hash of the index slots: the claim's key in the claims tree.
    pub fn hi(&self) -> Hash {
        hash_elems(&self.index_slots())
    }

    /// Hash of the value slots: the claim's value in the claims tree.
    pub fn hv(&self) -> Hash {
        hash_elems(&self.value_slots())
    }

    /// Claim hash, signed by the issuer.
    pub fn hash(&self) -> Hash {
        hash_elems(&[self.hi(), self.hv()])
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CLAIM_BYTES);
        for slot in self.index_slots().iter().chain(self.value_slots().iter()) {
            out.extend_from_slice(slot);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != CLAIM_BYTES {
            return Err(CoreError::ValidationError(format!(
                "claim must be {} bytes, got {}",
                CLAIM_BYTES,
                bytes.len()
            )));
        }
        let slot = |i: usize| -> Hash {
            let mut s = ZERO_HASH;
            s.copy_from_slice(&bytes[i * 32..(i + 1) * 32]);
            s
        };

        let header = slot(0);
        let flags = header[16];
        let mut schema_hash = [0u8; 16];
        schema_hash.copy_from_slice(&header[..16]);

        let subject = if flags & FLAG_SUBJECT != 0 {
            Some(IdentityId::from_bytes(&slot(1)[..ID_LENGTH])?)
        } else {
            None
        };

        let meta = slot(4);
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&meta[..8]);
        let mut version = [0u8; 4];
        version.copy_from_slice(&meta[8..12]);
        let mut expiration = [0u8; 8];
        expiration.copy_from_slice(&meta[12..20]);

        Ok(Self {
            schema_hash,
            subject,
            revocation_nonce: u64::from_le_bytes(nonce),
            version: u32::from_le_bytes(version),
            expiration: (flags & FLAG_EXPIRATION != 0).then(|| i64::from_le_bytes(expiration)),
            index_data: [slot(2), slot(3)],
            value_data: [slot(6), slot(7)],
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::ValidationError(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

use chrono::{DateTime, Utc};

use sigil_core::CoreError;
use sigil_credentials::CredentialError;
use sigil_crypto::CryptoError;
use sigil_status::StatusError;
use sigil_storage::StorageError;

/// Identity wallet errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    #[error("identity already exists: {0}")]
    IdentityAlreadyExists(String),

    #[error("key {key} is already the auth key of {owner}")]
    KeyAlreadyBound { key: String, owner: String },

    #[error("profile already exists: {0}")]
    ProfileAlreadyExists(String),

    #[error("credential request expired at {0}")]
    ExpiredCredentialRequest(DateTime<Utc>),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("status error: {0}")]
    Status(#[from] StatusError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl IdentityError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Credential(e) => e.is_recoverable(),
            Self::Status(e) => e.is_recoverable(),
            Self::Storage(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

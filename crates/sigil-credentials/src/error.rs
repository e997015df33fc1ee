use sigil_core::CoreError;
use sigil_crypto::CryptoError;
use sigil_status::StatusError;
use sigil_storage::StorageError;

/// Errors from the credential wallet and schema loading.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("schema {url} unavailable: {reason}")]
    SchemaUnavailable { url: String, reason: String },

    #[error("schema {url} is not a valid JSON schema: {reason}")]
    InvalidSchema { url: String, reason: String },

    #[error("credential subject does not match schema {url}: {}", .violations.join("; "))]
    SchemaViolation { url: String, violations: Vec<String> },

    #[error("credential not found: {0}")]
    NotFound(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("status error: {0}")]
    Status(#[from] StatusError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl CredentialError {
    /// Transient failures a caller may retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SchemaUnavailable { .. } => true,
            Self::Status(e) => e.is_recoverable(),
            Self::Storage(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

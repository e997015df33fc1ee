use sigil_core::CoreError;
use sigil_storage::StorageError;

/// Credential status resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("no resolver registered for status type {0}")]
    NoResolverRegistered(String),

    #[error("issuer not found: {0}")]
    IssuerNotFound(String),

    #[error("no published state for issuer {0}")]
    StateNotFound(String),

    #[error("revocation proof unavailable: {0}")]
    RevocationProofUnavailable(String),

    #[error("reverse hash service returned a corrupt node: {0}")]
    CorruptNode(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl StatusError {
    /// Expected transient conditions, surfaced to the caller without aborting.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::StateNotFound(_) | Self::RevocationProofUnavailable(_) => true,
            Self::Storage(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

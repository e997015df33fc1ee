use crate::credential_state::CredentialState;

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: CredentialState,
        to: CredentialState,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    #[error("invalid identity id: {0}")]
    InvalidId(String),

    #[error("unsupported network: {blockchain}:{network}")]
    UnsupportedNetwork { blockchain: String, network: String },

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key management and signing errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("invalid key id: {0}")]
    InvalidKeyId(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signing failed: {0}")]
    SigningError(String),
}

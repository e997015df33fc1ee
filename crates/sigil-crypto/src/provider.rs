use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::{KeyId, KmsKeyType};
use crate::store::SecretBytes;

/// Key operations for one key type.
pub trait KeyProvider: Send + Sync {
    fn key_type(&self) -> KmsKeyType;

    /// Derive a key deterministically from `seed` and keep its secret.
    fn new_key_from_seed(&self, seed: &[u8]) -> Result<KeyId, CryptoError>;

    fn public_key(&self, key_id: &KeyId) -> Result<Vec<u8>, CryptoError>;

    fn sign(&self, key_id: &KeyId, message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Check `signature` over `message` for a raw public key.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8])
        -> Result<bool, CryptoError>;
}

/// Stretch an arbitrary seed into 32 bytes of key material.
pub(crate) fn derive_secret(seed: &[u8]) -> SecretBytes {
    Zeroizing::new(*blake3::hash(seed).as_bytes())
}

pub(crate) fn check_key_type(key_id: &KeyId, expected: KmsKeyType) -> Result<(), CryptoError> {
    if key_id.key_type != expected {
        return Err(CryptoError::UnsupportedKeyType(format!(
            "{} provider cannot use key {}",
            expected, key_id
        )));
    }
    Ok(())
}

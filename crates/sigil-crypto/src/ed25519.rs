use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::sync::Arc;

use crate::error::CryptoError;
use crate::keys::{KeyId, KmsKeyType};
use crate::provider::{check_key_type, derive_secret, KeyProvider};
use crate::store::PrivateKeyStore;

/// Ed25519 keys. The derived 32-byte secret is used directly as the signing key.
pub struct Ed25519Provider {
    store: Arc<dyn PrivateKeyStore>,
}

impl Ed25519Provider {
    pub fn new(store: Arc<dyn PrivateKeyStore>) -> Self {
        Self { store }
    }

    fn signing_key(&self, key_id: &KeyId) -> Result<SigningKey, CryptoError> {
        let secret = self.store.get(key_id)?;
        Ok(SigningKey::from_bytes(&secret))
    }
}

impl KeyProvider for Ed25519Provider {
    fn key_type(&self) -> KmsKeyType {
        KmsKeyType::Ed25519
    }

    fn new_key_from_seed(&self, seed: &[u8]) -> Result<KeyId, CryptoError> {
        let secret = derive_secret(seed);
        let signing_key = SigningKey::from_bytes(&secret);
        let key_id = KeyId::new(KmsKeyType::Ed25519, signing_key.verifying_key().as_bytes());
        self.store.import(&key_id, secret)?;
        tracing::debug!(key = %key_id, "ed25519 key created");
        Ok(key_id)
    }

    fn public_key(&self, key_id: &KeyId) -> Result<Vec<u8>, CryptoError> {
        check_key_type(key_id, KmsKeyType::Ed25519)?;
        Ok(self.signing_key(key_id)?.verifying_key().to_bytes().to_vec())
    }

    fn sign(&self, key_id: &KeyId, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_key_type(key_id, KmsKeyType::Ed25519)?;
        Ok(self.signing_key(key_id)?.sign(message).to_bytes().to_vec())
    }

    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        verify(public_key, message, signature)
    }
}

/// Check an Ed25519 signature against a raw 32-byte public key.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
    let pk: [u8; 32] = public_key
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: public_key.len(),
        })?;
    let verifying_key =
        VerifyingKey::from_bytes(&pk).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let sig: [u8; 64] = signature.try_into().map_err(|_| {
        CryptoError::InvalidSignature(format!("expected 64 bytes, got {}", signature.len()))
    })?;
    Ok(verifying_key
        .verify(message, &Signature::from_bytes(&sig))
        .is_ok())
}

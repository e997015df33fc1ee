use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::{KeyId, KmsKeyType};
use crate::provider::KeyProvider;

/// Key management service dispatching to one provider per key type.
#[derive(Default)]
pub struct Kms {
    providers: DashMap<KmsKeyType, Arc<dyn KeyProvider>>,
}

impl Kms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for `key_type`, replacing any earlier one.
    pub fn register_key_provider(&self, key_type: KmsKeyType, provider: Arc<dyn KeyProvider>) {
        if self.providers.insert(key_type, provider).is_some() {
            tracing::warn!(key_type = %key_type, "key provider replaced");
        }
    }

    fn provider(&self, key_type: KmsKeyType) -> Result<Arc<dyn KeyProvider>, CryptoError> {
        self.providers
            .get(&key_type)
            .map(|p| Arc::clone(p.value()))
            .ok_or_else(|| CryptoError::UnsupportedKeyType(key_type.to_string()))
    }

    /// Generate a key from fresh OS entropy.
    pub fn generate_key(&self, key_type: KmsKeyType) -> Result<KeyId, CryptoError> {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut seed[..]);
        self.create_key_from_seed(key_type, &seed[..])
    }

    /// Derive a key deterministically from `seed`.
    pub fn create_key_from_seed(
        &self,
        key_type: KmsKeyType,
        seed: &[u8],
    ) -> Result<KeyId, CryptoError> {
        self.provider(key_type)?.new_key_from_seed(seed)
    }

    pub fn public_key(&self, key_id: &KeyId) -> Result<Vec<u8>, CryptoError> {
        self.provider(key_id.key_type)?.public_key(key_id)
    }

    pub fn sign(&self, key_id: &KeyId, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.provider(key_id.key_type)?.sign(key_id, message)
    }

    pub fn verify(
        &self,
        key_type: KmsKeyType,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        self.provider(key_type)?.verify(public_key, message, signature)
    }

    pub fn supports(&self, key_type: KmsKeyType) -> bool {
        self.providers.contains_key(&key_type)
    }
}

/// Verify a signature without a key store.
pub fn verify_signature(
    key_type: KmsKeyType,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    match key_type {
        KmsKeyType::BabyJubJub => crate::bjj::verify(public_key, message, signature),
        KmsKeyType::Ed25519 => crate::ed25519::verify(public_key, message, signature),
    }
}

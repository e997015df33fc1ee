use dashmap::DashMap;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::KeyId;

/// 32-byte private key material, wiped on drop.
pub type SecretBytes = Zeroizing<[u8; 32]>;

/// Storage for private key material, keyed by key handle.
pub trait PrivateKeyStore: Send + Sync {
    fn import(&self, key_id: &KeyId, secret: SecretBytes) -> Result<(), CryptoError>;
    fn get(&self, key_id: &KeyId) -> Result<SecretBytes, CryptoError>;
}

/// Process-lifetime key store. Nothing is persisted across restarts.
#[derive(Default)]
pub struct InMemoryPrivateKeyStore {
    keys: DashMap<String, SecretBytes>,
}

impl InMemoryPrivateKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl PrivateKeyStore for InMemoryPrivateKeyStore {
    fn import(&self, key_id: &KeyId, secret: SecretBytes) -> Result<(), CryptoError> {
        self.keys.insert(key_id.to_string(), secret);
        Ok(())
    }

    fn get(&self, key_id: &KeyId) -> Result<SecretBytes, CryptoError> {
        self.keys
            .get(&key_id.to_string())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CryptoError::KeyNotFound(key_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KmsKeyType;

    #[test]
    fn test_import_and_get() {
        let store = InMemoryPrivateKeyStore::new();
        let key = KeyId::new(KmsKeyType::BabyJubJub, &[1]);
        store.import(&key, Zeroizing::new([7u8; 32])).unwrap();
        assert_eq!(*store.get(&key).unwrap(), [7u8; 32]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_key() {
        let store = InMemoryPrivateKeyStore::new();
        let key = KeyId::new(KmsKeyType::BabyJubJub, &[1]);
        assert!(matches!(store.get(&key), Err(CryptoError::KeyNotFound(_))));
    }
}

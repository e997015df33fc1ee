use serde::{Deserialize, Serialize};
use std::sync::Arc;

use sigil_core::{Did, IssuerState};
use sigil_crypto::KeyId;

use crate::data_source::{DataSource, InMemoryDataSource};
use crate::error::StorageError;

/// Identity record held by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub did: Did,
    pub state: IssuerState,
    pub is_state_genesis: bool,
    pub is_state_published: bool,
    pub auth_key: KeyId,
}

/// A profile derived from a genesis identity for one verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Did,
    pub nonce: u64,
    pub genesis_identifier: Did,
    pub verifier: String,
}

pub struct IdentityStorage {
    identities: Arc<dyn DataSource<Identity>>,
    profiles: Arc<dyn DataSource<Profile>>,
}

impl IdentityStorage {
    pub fn new(
        identities: Arc<dyn DataSource<Identity>>,
        profiles: Arc<dyn DataSource<Profile>>,
    ) -> Self {
        Self {
            identities,
            profiles,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryDataSource::new()),
            Arc::new(InMemoryDataSource::new()),
        )
    }

    /// Insert or update the record for `identity.did`.
    pub fn save_identity(&self, identity: &Identity) -> Result<(), StorageError> {
        self.identities.save(&identity.did.to_string(), identity)
    }

    pub fn get_identity(&self, did: &Did) -> Result<Option<Identity>, StorageError> {
        self.identities.get(&did.to_string())
    }

    /// Remove the record for `did`. Missing records are not an error.
    pub fn delete_identity(&self, did: &Did) -> Result<(), StorageError> {
        self.identities.delete(&did.to_string())
    }

    pub fn get_all_identities(&self) -> Result<Vec<Identity>, StorageError> {
        self.identities.load()
    }

    /// The identity whose auth key is `key`, if any.
    pub fn find_by_auth_key(&self, key: &KeyId) -> Result<Option<Identity>, StorageError> {
        Ok(self
            .identities
            .load()?
            .into_iter()
            .find(|identity| identity.auth_key == *key))
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let key = profile.id.to_string();
        if self.profiles.get(&key)?.is_some() {
            return Err(StorageError::AlreadyExists(format!("profile {}", key)));
        }
        self.profiles.save(&key, profile)
    }

    pub fn get_profile(&self, id: &Did) -> Result<Option<Profile>, StorageError> {
        self.profiles.get(&id.to_string())
    }

    pub fn get_profiles_by_genesis(&self, genesis: &Did) -> Result<Vec<Profile>, StorageError> {
        Ok(self
            .profiles
            .load()?
            .into_iter()
            .filter(|p| p.genesis_identifier == *genesis)
            .collect())
    }
}

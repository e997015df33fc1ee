//! Sigil Storage: identity and credential stores, per-identity sparse
//! Merkle trees and readers of published identity state.

pub mod credential;
pub mod data_source;
pub mod error;
pub mod identity;
pub mod merkle;
pub mod rocks;
pub mod state;

use std::path::Path;
use std::sync::Arc;

pub use credential::CredentialStorage;
pub use data_source::{DataSource, InMemoryDataSource};
pub use error::StorageError;
pub use identity::{Identity, IdentityStorage, Profile};
pub use merkle::{MerkleTreeStorage, MerkleTreeType, SparseMerkleTree, DEFAULT_MAX_DEPTH};
pub use state::{
    EthConnectionConfig, EthStateStorage, InMemoryStateStorage, StateInfo, StateStorage,
    StateTransition,
};

use rocks::{
    RocksDbDataSource, RocksDbNodeStore, RocksDbStore, CF_CREDENTIALS, CF_IDENTITIES, CF_PROFILES,
};

/// The storage bundle shared by the identity and credential wallets.
pub struct DataStorage {
    pub credential: CredentialStorage,
    pub identity: IdentityStorage,
    pub mt: MerkleTreeStorage,
    pub states: Arc<dyn StateStorage>,
}

impl DataStorage {
    /// All stores in memory, trees of `max_depth` levels.
    pub fn in_memory(
        max_depth: usize,
        states: Arc<dyn StateStorage>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            credential: CredentialStorage::in_memory(),
            identity: IdentityStorage::in_memory(),
            mt: MerkleTreeStorage::in_memory(max_depth)?,
            states,
        })
    }

    /// All stores in one RocksDB database at `path`.
    pub fn rocksdb(
        path: &Path,
        max_depth: usize,
        states: Arc<dyn StateStorage>,
    ) -> Result<Self, StorageError> {
        let db = Arc::new(RocksDbStore::open(path)?);
        Ok(Self {
            credential: CredentialStorage::new(Arc::new(RocksDbDataSource::new(
                db.clone(),
                CF_CREDENTIALS,
            ))),
            identity: IdentityStorage::new(
                Arc::new(RocksDbDataSource::new(db.clone(), CF_IDENTITIES)),
                Arc::new(RocksDbDataSource::new(db.clone(), CF_PROFILES)),
            ),
            mt: MerkleTreeStorage::new(Arc::new(RocksDbNodeStore::new(db)), max_depth)?,
            states,
        })
    }
}

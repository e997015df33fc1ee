//! RocksDB storage backend.

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use sigil_core::hash::Hash;

use crate::data_source::{DataSource, Record};
use crate::error::StorageError;
use crate::merkle::{MerkleNodeStore, Node};

/// Column family names for different data types.
pub const CF_IDENTITIES: &str = "identities";
pub const CF_PROFILES: &str = "profiles";
pub const CF_CREDENTIALS: &str = "credentials";
pub const CF_MERKLE_NODES: &str = "merkle_nodes";
pub const CF_MERKLE_ROOTS: &str = "merkle_roots";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_IDENTITIES,
    CF_PROFILES,
    CF_CREDENTIALS,
    CF_MERKLE_NODES,
    CF_MERKLE_ROOTS,
];

/// RocksDB database with one column family per record kind.
pub struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)
            .map_err(|e| StorageError::Database(format!("{}: {}", path.display(), e)))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        tracing::info!(path = %path.display(), "rocksdb opened");

        Ok(Self { db })
    }

    fn cf(&self, cf_name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(cf_name)
            .ok_or_else(|| StorageError::Database(format!("column family '{}' not found", cf_name)))
    }

    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db.put_cf(self.cf(cf_name)?, key, value)?;
        Ok(())
    }

    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get_cf(self.cf(cf_name)?, key)?)
    }

    pub fn delete(&self, cf_name: &str, key: &[u8]) -> Result<(), StorageError> {
        self.db.delete_cf(self.cf(cf_name)?, key)?;
        Ok(())
    }

    /// All values of a column family.
    pub fn values(&self, cf_name: &str) -> Result<Vec<Vec<u8>>, StorageError> {
        let mut out = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf_name)?, IteratorMode::Start) {
            let (_, value) = item?;
            out.push(value.to_vec());
        }
        Ok(out)
    }
}

/// JSON records in one column family.
pub struct RocksDbDataSource<T> {
    store: Arc<RocksDbStore>,
    cf_name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RocksDbDataSource<T> {
    pub fn new(store: Arc<RocksDbStore>, cf_name: &'static str) -> Self {
        Self {
            store,
            cf_name,
            _marker: PhantomData,
        }
    }
}

impl<T: Record> DataSource<T> for RocksDbDataSource<T> {
    fn save(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value)?;
        self.store.put(self.cf_name, key.as_bytes(), &bytes)
    }

    fn get(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.store.get(self.cf_name, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load(&self) -> Result<Vec<T>, StorageError> {
        self.store
            .values(self.cf_name)?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(StorageError::from))
            .collect()
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.store.delete(self.cf_name, key.as_bytes())
    }
}

/// Merkle nodes keyed by hash, roots keyed by tree name.
pub struct RocksDbNodeStore {
    store: Arc<RocksDbStore>,
}

impl RocksDbNodeStore {
    pub fn new(store: Arc<RocksDbStore>) -> Self {
        Self { store }
    }
}

impl MerkleNodeStore for RocksDbNodeStore {
    fn get_node(&self, hash: &Hash) -> Result<Option<Node>, StorageError> {
        match self.store.get(CF_MERKLE_NODES, hash)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_node(&self, node: &Node) -> Result<Hash, StorageError> {
        let hash = node.hash();
        self.store
            .put(CF_MERKLE_NODES, &hash, &serde_json::to_vec(node)?)?;
        Ok(hash)
    }

    fn get_root(&self, tree: &str) -> Result<Option<Hash>, StorageError> {
        match self.store.get(CF_MERKLE_ROOTS, tree.as_bytes())? {
            Some(bytes) => {
                let root: Hash = bytes.as_slice().try_into().map_err(|_| {
                    StorageError::Database(format!("corrupt root for tree {}", tree))
                })?;
                Ok(Some(root))
            }
            None => Ok(None),
        }
    }

    fn set_root(&self, tree: &str, root: Hash) -> Result<(), StorageError> {
        self.store.put(CF_MERKLE_ROOTS, tree.as_bytes(), &root)
    }

    fn delete_root(&self, tree: &str) -> Result<(), StorageError> {
        self.store.delete(CF_MERKLE_ROOTS, tree.as_bytes())
    }
}

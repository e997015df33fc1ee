use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// Keyed record storage shared by the identity and credential stores.
pub trait DataSource<T>: Send + Sync {
    fn save(&self, key: &str, value: &T) -> Result<(), StorageError>;
    fn get(&self, key: &str) -> Result<Option<T>, StorageError>;
    /// All records, in no particular order.
    fn load(&self) -> Result<Vec<T>, StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Values a data source can hold.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// DashMap-backed data source.
pub struct InMemoryDataSource<T> {
    items: DashMap<String, T>,
}

impl<T> InMemoryDataSource<T> {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }
}

impl<T> Default for InMemoryDataSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> DataSource<T> for InMemoryDataSource<T> {
    fn save(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<T>, StorageError> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    fn load(&self) -> Result<Vec<T>, StorageError> {
        Ok(self.items.iter().map(|e| e.value().clone()).collect())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }
}

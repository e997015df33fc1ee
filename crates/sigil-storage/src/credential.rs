use std::sync::Arc;

use sigil_core::{Did, W3CCredential};

use crate::data_source::{DataSource, InMemoryDataSource};
use crate::error::StorageError;

/// Append-only credential store keyed by credential id.
pub struct CredentialStorage {
    credentials: Arc<dyn DataSource<W3CCredential>>,
}

impl CredentialStorage {
    /// Store credentials in `credentials`.
    pub fn new(credentials: Arc<dyn DataSource<W3CCredential>>) -> Self {
        Self { credentials }
    }

    /// A store that lives as long as the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryDataSource::new()))
    }

    /// Save a credential. A second save of the same id keeps the first
    /// record and returns `false`.
    pub fn save_credential(&self, credential: &W3CCredential) -> Result<bool, StorageError> {
        if self.credentials.get(&credential.id)?.is_some() {
            tracing::debug!(id = %credential.id, "credential already stored");
            return Ok(false);
        }
        self.credentials.save(&credential.id, credential)?;
        Ok(true)
    }

    /// Look up a credential by its `urn:uuid:` id.
    pub fn get_credential_by_id(&self, id: &str) -> Result<Option<W3CCredential>, StorageError> {
        self.credentials.get(id)
    }

    /// Every stored credential, in no particular order.
    pub fn list_credentials(&self) -> Result<Vec<W3CCredential>, StorageError> {
        self.credentials.load()
    }

    /// Credentials whose `credentialSubject.id` is `subject`.
    pub fn find_by_subject(&self, subject: &Did) -> Result<Vec<W3CCredential>, StorageError> {
        Ok(self
            .credentials
            .load()?
            .into_iter()
            .filter(|c| c.subject_did().as_ref() == Some(subject))
            .collect())
    }

    /// Number of stored credentials.
    pub fn count(&self) -> Result<usize, StorageError> {
        Ok(self.credentials.load()?.len())
    }
}

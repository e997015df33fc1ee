use sigil_core::CoreError;

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("entry index already exists in tree")]
    EntryIndexAlreadyExists,

    #[error("reached maximum tree depth")]
    ReachedMaxLevel,

    #[error("key not found in tree")]
    KeyNotFound,

    #[error("invalid tree depth: {0}")]
    InvalidDepth(usize),

    #[error("no published state for {0}")]
    StateNotFound(String),

    #[error("state transition rejected: {0}")]
    StateMismatch(String),

    #[error("state storage is read-only")]
    ReadOnly,

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("request timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl StorageError {
    /// Whether the caller may retry or continue without aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StateNotFound(_) | Self::Rpc(_) | Self::Timeout)
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

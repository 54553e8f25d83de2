use thiserror::Error;

use crate::kv::KVStoreError;

/// Errors surfaced by the block store.
#[derive(Debug, Error)]
pub enum BlockStoreError {
    #[error("underlying key-value store failed: {0}")]
    Kv(#[from] KVStoreError),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("block {height} not found")]
    BlockNotFound { height: u64 },
    #[error("header at height {height} not found")]
    HeaderNotFound { height: u64 },
    #[error("transaction {0:x?} not found")]
    TransactionNotFound(Vec<u8>),
    #[error("data directory is locked by another process: {0}")]
    DirectoryLocked(String),
    #[error("filesystem error: {0}")]
    Io(String),
}

impl From<bincode::Error> for BlockStoreError {
    fn from(e: bincode::Error) -> Self {
        BlockStoreError::Serialization(e.to_string())
    }
}

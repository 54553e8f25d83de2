use thiserror::Error;

use ledger_block_store::kv::KVStoreError;

/// Errors surfaced by the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("underlying key-value store failed: {0}")]
    Kv(#[from] KVStoreError),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for EventStoreError {
    fn from(e: bincode::Error) -> Self {
        EventStoreError::Serialization(e.to_string())
    }
}

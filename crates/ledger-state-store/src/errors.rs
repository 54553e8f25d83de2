use thiserror::Error;

use ledger_block_store::kv::KVStoreError;
use ledger_types::VmError;

/// Errors surfaced by the state store.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("underlying key-value store failed: {0}")]
    Kv(#[from] KVStoreError),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("merkle proof height {proof_height} exceeds root height {root_height}")]
    ProofHeightOutOfRange { proof_height: u64, root_height: u64 },
    #[error("merkle root not found at height {0}")]
    RootNotFound(u64),
    #[error("contract execution failed: {0}")]
    Vm(#[from] VmError),
    #[error("overlay carries a fatal error from a previous write: {0}")]
    OverlayPoisoned(String),
}

impl From<bincode::Error> for StateStoreError {
    fn from(e: bincode::Error) -> Self {
        StateStoreError::Serialization(e.to_string())
    }
}

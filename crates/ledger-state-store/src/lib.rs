//! # State Store
//!
//! Contract/storage state, bookkeeper state, and the tx-root Merkle tree
//! (SPEC-3, SPEC-4.1, SPEC-4.3). Grounded on
//! `qc-02-block-storage::service::BlockStorageService` and
//! `qc-04-state-management`'s overlay/cache split.

pub mod errors;
pub mod merkle;
pub mod overlay;
pub mod store;

pub use errors::StateStoreError;
pub use merkle::{MerkleProof, MerkleTree};
pub use overlay::{CacheDB, Overlay};
pub use store::{contract_key, storage_key, StateStore};

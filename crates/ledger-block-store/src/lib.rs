//! # Block Store
//!
//! Persists blocks, headers, the height->hash index, the transaction index
//! and sys-fee records, and exposes the `SYSTEM_VERSION` marker (SPEC-4.1,
//! SPEC-4.3, SPEC-4.4, SPEC-6). Grounded on
//! `qc-02-block-storage::service::BlockStorageService`.

pub mod errors;
pub mod kv;
pub mod lock;
pub mod store;

pub use errors::BlockStoreError;
pub use kv::{Batch, BatchOperation, FileBackedKVStore, InMemoryKVStore, KVStoreError, KeyValueStore};
pub use lock::DatabaseLock;
pub use store::{BlockStore, CurrentBlock};

//! # Event Store
//!
//! Persists per-tx execute-notifies and per-block tx-hash lists
//! (SPEC-4.3). Must be idempotent: replaying the same block's save during
//! crash-recovery re-executes that block, so the writes land on the same
//! keys rather than appending (SPEC-4.1 "event store must be idempotent,
//! events committed before state"). Grounded on
//! `qc-02-block-storage::service::BlockStorageService`'s keyspace shape,
//! narrowed to the event-only slice this store owns.

use std::path::Path;
use std::sync::RwLock;

use ledger_block_store::kv::{Batch, FileBackedKVStore, InMemoryKVStore, KeyValueStore};
use ledger_block_store::lock::DatabaseLock;
use ledger_types::{ExecuteNotify, Hash};

use crate::errors::EventStoreError;

const KEY_CURRENT_BLOCK: &[u8] = b"sys:current-block";
const PREFIX_NOTIFY: &[u8] = b"notify:";
const PREFIX_BLOCK_TXS: &[u8] = b"blktxs:";

fn notify_key(tx_hash: &Hash) -> Vec<u8> {
    let mut key = PREFIX_NOTIFY.to_vec();
    key.extend_from_slice(tx_hash);
    key
}

fn block_txs_key(height: u64) -> Vec<u8> {
    let mut key = PREFIX_BLOCK_TXS.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
struct CurrentBlock {
    height: u64,
    hash: Hash,
}

/// The event store: per-tx notifications plus the per-block list of
/// transaction hashes that produced them.
pub struct EventStore<KV: KeyValueStore> {
    kv: RwLock<KV>,
    _lock: Option<DatabaseLock>,
}

impl EventStore<InMemoryKVStore> {
    pub fn open_in_memory() -> Self {
        Self {
            kv: RwLock::new(InMemoryKVStore::new()),
            _lock: None,
        }
    }
}

impl EventStore<FileBackedKVStore> {
    /// Open (or create) a file-backed event store under
    /// `{data_dir}/ledgerevent`, holding an advisory exclusive lock on
    /// that directory for the store's lifetime (SPEC_FULL B.6).
    pub fn open_file_backed<P: AsRef<Path>>(data_dir: P) -> Result<Self, EventStoreError> {
        let data_dir = data_dir.as_ref();
        let lock = DatabaseLock::acquire(data_dir)
            .map_err(|e| EventStoreError::Kv(ledger_block_store::kv::KVStoreError::Io(e.to_string())))?;
        let kv = FileBackedKVStore::open(data_dir.join("events.db")).map_err(EventStoreError::Kv)?;
        Ok(Self {
            kv: RwLock::new(kv),
            _lock: Some(lock),
        })
    }
}

impl<KV: KeyValueStore> EventStore<KV> {
    pub fn new_batch(&self) -> Batch {
        Batch::new()
    }

    pub fn commit_to(&self, batch: Batch) -> Result<(), EventStoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.kv.write().unwrap().atomic_batch_write(batch.into_ops())?;
        Ok(())
    }

    pub fn clear_all(&self) -> Result<(), EventStoreError> {
        self.kv.write().unwrap().clear_all()?;
        Ok(())
    }

    pub fn get_current_block(&self) -> Result<Option<(u64, Hash)>, EventStoreError> {
        match self.kv.read().unwrap().get(KEY_CURRENT_BLOCK)? {
            Some(bytes) => {
                let record: CurrentBlock = bincode::deserialize(&bytes)?;
                Ok(Some((record.height, record.hash)))
            }
            None => Ok(None),
        }
    }

    pub fn save_current_block(
        &self,
        height: u64,
        hash: Hash,
        batch: &mut Batch,
    ) -> Result<(), EventStoreError> {
        let record = CurrentBlock { height, hash };
        batch.put(KEY_CURRENT_BLOCK, bincode::serialize(&record)?);
        Ok(())
    }

    /// Record a transaction's execute-notify, keyed by tx hash so
    /// re-saving the same tx (crash-recovery replay) overwrites rather
    /// than appends.
    pub fn save_notify(
        &self,
        tx_hash: Hash,
        notify: &ExecuteNotify,
        batch: &mut Batch,
    ) -> Result<(), EventStoreError> {
        batch.put(notify_key(&tx_hash), bincode::serialize(notify)?);
        Ok(())
    }

    pub fn get_event_notify_by_tx(
        &self,
        tx_hash: &Hash,
    ) -> Result<Option<ExecuteNotify>, EventStoreError> {
        match self.kv.read().unwrap().get(&notify_key(tx_hash))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Record the list of tx hashes a block produced, when non-empty
    /// (SPEC-4.1 "persist block->[txHash] list when non-empty"). Keyed
    /// by height, so replaying the same block overwrites the same entry.
    pub fn save_event_notify_by_block(
        &self,
        height: u64,
        tx_hashes: &[Hash],
        batch: &mut Batch,
    ) -> Result<(), EventStoreError> {
        if tx_hashes.is_empty() {
            return Ok(());
        }
        batch.put(block_txs_key(height), bincode::serialize(&tx_hashes.to_vec())?);
        Ok(())
    }

    pub fn get_event_notify_by_block(&self, height: u64) -> Result<Vec<Hash>, EventStoreError> {
        match self.kv.read().unwrap().get(&block_txs_key(height))? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn close(self) {
        drop(self._lock);
    }
}

//! # Block Store
//!
//! Persists blocks, the height -> hash index, the transaction index, sys-fee
//! amounts and the header index, per SPEC-4.1/4.3/4.4. Grounded on
//! `qc-02-block-storage::service::BlockStorageService`, generalized from its
//! single `StoredBlock` keyspace into the five keyspaces this engine needs.

use std::path::Path;
use std::sync::RwLock;

use ledger_types::{Block, Hash, Header, Transaction, HEADER_INDEX_BATCH_SIZE};
use tracing::{debug, trace, warn};

use crate::errors::BlockStoreError;
use crate::kv::{Batch, BatchOperation, FileBackedKVStore, InMemoryKVStore, KeyValueStore};
use crate::lock::DatabaseLock;

const KEY_VERSION: &[u8] = b"sys:version";
const KEY_CURRENT_BLOCK: &[u8] = b"sys:current-block";
const PREFIX_H2B: &[u8] = b"h2b:";
const PREFIX_BLOCK: &[u8] = b"blk:";
const PREFIX_TX: &[u8] = b"tx:";
const PREFIX_SYSFEE: &[u8] = b"fee:";
const PREFIX_HEADER_INDEX_BATCH: &[u8] = b"hidx:";

fn h2b_key(height: u64) -> Vec<u8> {
    let mut key = PREFIX_H2B.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}

fn block_key(hash: &Hash) -> Vec<u8> {
    let mut key = PREFIX_BLOCK.to_vec();
    key.extend_from_slice(hash);
    key
}

fn tx_key(hash: &Hash) -> Vec<u8> {
    let mut key = PREFIX_TX.to_vec();
    key.extend_from_slice(hash);
    key
}

fn sysfee_key(hash: &Hash) -> Vec<u8> {
    let mut key = PREFIX_SYSFEE.to_vec();
    key.extend_from_slice(hash);
    key
}

fn header_index_batch_key(batch_start: u64) -> Vec<u8> {
    let mut key = PREFIX_HEADER_INDEX_BATCH.to_vec();
    key.extend_from_slice(&batch_start.to_be_bytes());
    key
}

/// On-disk record for a stored transaction: the transaction itself plus
/// the height of the block it landed in (so `get_transaction` can answer
/// both questions in one lookup).
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoredTransaction {
    transaction: Transaction,
    height: u64,
}

/// Current chain tip, as last committed by `save_current_block`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct CurrentBlock {
    pub height: u64,
    pub hash: Hash,
}

/// In-memory state of the header index: the full ordered hash list is
/// always authoritative here; `flushed_len` tracks how much of it has a
/// durable counterpart under `hidx:` batch keys (SPEC-4.4).
struct HeaderIndexState {
    hashes: Vec<Hash>,
    flushed_len: usize,
}

/// The block store: owns a single `KeyValueStore` and presents the typed
/// BlockStore contract from SPEC-4.1 on top of it.
pub struct BlockStore<KV: KeyValueStore> {
    kv: RwLock<KV>,
    header_index: RwLock<HeaderIndexState>,
    _lock: Option<DatabaseLock>,
}

impl BlockStore<InMemoryKVStore> {
    pub fn open_in_memory() -> Self {
        Self::open(InMemoryKVStore::new()).expect("in-memory store cannot fail to open")
    }
}

impl BlockStore<FileBackedKVStore> {
    /// Open (or create) a file-backed block store under `{data_dir}/block`,
    /// holding an advisory exclusive lock on that directory for the store's
    /// lifetime (SPEC_FULL B.6).
    pub fn open_file_backed<P: AsRef<Path>>(data_dir: P) -> Result<Self, BlockStoreError> {
        let data_dir = data_dir.as_ref();
        let lock = DatabaseLock::acquire(data_dir)?;
        let kv = FileBackedKVStore::open(data_dir.join("block.db")).map_err(BlockStoreError::Kv)?;
        let mut store = Self::open(kv)?;
        store._lock = Some(lock);
        Ok(store)
    }
}

impl<KV: KeyValueStore> BlockStore<KV> {
    /// Open a store over `kv`, replaying any previously flushed header-index
    /// batches into memory.
    pub fn open(kv: KV) -> Result<Self, BlockStoreError> {
        let mut batches: Vec<(u64, Vec<Hash>)> = Vec::new();
        for (key, value) in kv.prefix_scan(PREFIX_HEADER_INDEX_BATCH)? {
            let start = u64::from_be_bytes(
                key[PREFIX_HEADER_INDEX_BATCH.len()..]
                    .try_into()
                    .map_err(|_| BlockStoreError::Serialization("malformed hidx key".into()))?,
            );
            let hashes: Vec<Hash> = bincode::deserialize(&value)?;
            batches.push((start, hashes));
        }
        batches.sort_by_key(|(start, _)| *start);

        let mut hashes = Vec::new();
        for (start, batch) in batches {
            if start != hashes.len() as u64 {
                warn!(
                    expected = hashes.len() as u64,
                    found = start,
                    "header index batch gap on open"
                );
            }
            hashes.extend(batch);
        }
        let flushed_len = hashes.len();

        Ok(Self {
            kv: RwLock::new(kv),
            header_index: RwLock::new(HeaderIndexState {
                hashes,
                flushed_len,
            }),
            _lock: None,
        })
    }

    /// Start a fresh batch of writes (SPEC-4.1 "Open fresh batches on all
    /// three stores").
    pub fn new_batch(&self) -> Batch {
        Batch::new()
    }

    /// Apply a batch atomically.
    pub fn commit_to(&self, batch: Batch) -> Result<(), BlockStoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.kv.write().unwrap().atomic_batch_write(batch.into_ops())?;
        Ok(())
    }

    pub fn clear_all(&self) -> Result<(), BlockStoreError> {
        self.kv.write().unwrap().clear_all()?;
        let mut idx = self.header_index.write().unwrap();
        idx.hashes.clear();
        idx.flushed_len = 0;
        Ok(())
    }

    pub fn get_version(&self) -> Result<Option<u8>, BlockStoreError> {
        Ok(self
            .kv
            .read()
            .unwrap()
            .get(KEY_VERSION)?
            .and_then(|v| v.first().copied()))
    }

    pub fn save_version(&self, version: u8) -> Result<(), BlockStoreError> {
        self.kv.write().unwrap().put(KEY_VERSION, &[version])?;
        Ok(())
    }

    pub fn get_current_block(&self) -> Result<Option<CurrentBlock>, BlockStoreError> {
        match self.kv.read().unwrap().get(KEY_CURRENT_BLOCK)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_current_block(&self, height: u64, hash: Hash) -> Result<(), BlockStoreError> {
        let record = CurrentBlock { height, hash };
        let bytes = bincode::serialize(&record)?;
        self.kv.write().unwrap().put(KEY_CURRENT_BLOCK, &bytes)?;
        Ok(())
    }

    /// Same as `save_current_block`, but queues the write on `batch`
    /// instead of writing straight through — for callers (the
    /// coordinator's block-save protocol) that need the tip pointer to
    /// land atomically with the rest of a block's writes.
    pub fn save_current_block_to_batch(
        &self,
        height: u64,
        hash: Hash,
        batch: &mut Batch,
    ) -> Result<(), BlockStoreError> {
        let record = CurrentBlock { height, hash };
        batch.put(KEY_CURRENT_BLOCK, bincode::serialize(&record)?);
        Ok(())
    }

    pub fn save_block_hash(&self, height: u64, hash: Hash) -> Result<(), BlockStoreError> {
        self.kv
            .write()
            .unwrap()
            .put(&h2b_key(height), &hash)?;
        Ok(())
    }

    pub fn get_block_hash(&self, height: u64) -> Result<Option<Hash>, BlockStoreError> {
        match self.kv.read().unwrap().get(&h2b_key(height))? {
            Some(bytes) => {
                let hash: Hash = bytes
                    .try_into()
                    .map_err(|_| BlockStoreError::Serialization("malformed hash".into()))?;
                Ok(Some(hash))
            }
            None => Ok(None),
        }
    }

    /// Persist a full block: the block body, its height->hash entry, its
    /// transaction index entries, and appends its hash to the header index.
    /// All writes land in `batch`; nothing is visible until `commit_to`.
    pub fn save_block(&self, block: &Block, batch: &mut Batch) -> Result<(), BlockStoreError> {
        let hash = block.hash();
        let height = block.height();

        let encoded = bincode::serialize(block)?;
        batch.put(block_key(&hash), encoded);
        batch.put(h2b_key(height), hash.to_vec());

        for tx in &block.transactions {
            let stored = StoredTransaction {
                transaction: tx.clone(),
                height,
            };
            batch.put(tx_key(&tx.hash()), bincode::serialize(&stored)?);
        }

        self.append_to_header_index(height, hash, batch)?;
        trace!(height, "queued block for commit");
        Ok(())
    }

    fn append_to_header_index(
        &self,
        height: u64,
        hash: Hash,
        batch: &mut Batch,
    ) -> Result<(), BlockStoreError> {
        let mut idx = self.header_index.write().unwrap();
        if height as usize != idx.hashes.len() {
            warn!(
                height,
                expected = idx.hashes.len() as u64,
                "header index append out of sequence"
            );
        }
        idx.hashes.push(hash);

        while idx.hashes.len() - idx.flushed_len >= HEADER_INDEX_BATCH_SIZE as usize {
            let start = idx.flushed_len as u64;
            let end = idx.flushed_len + HEADER_INDEX_BATCH_SIZE as usize;
            let chunk = idx.hashes[idx.flushed_len..end].to_vec();
            batch.put(header_index_batch_key(start), bincode::serialize(&chunk)?);
            idx.flushed_len = end;
            debug!(start, end, "flushing header index batch");
        }
        Ok(())
    }

    pub fn get_block(&self, height: u64) -> Result<Option<Block>, BlockStoreError> {
        let hash = match self.get_block_hash(height)? {
            Some(h) => h,
            None => return Ok(None),
        };
        self.get_block_by_hash(&hash)
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, BlockStoreError> {
        match self.kv.read().unwrap().get(&block_key(hash))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contain_block(&self, hash: &Hash) -> Result<bool, BlockStoreError> {
        Ok(self.kv.read().unwrap().exists(&block_key(hash))?)
    }

    pub fn get_header(&self, height: u64) -> Result<Option<Header>, BlockStoreError> {
        Ok(self.get_block(height)?.map(|b| b.header))
    }

    pub fn get_transaction(
        &self,
        hash: &Hash,
    ) -> Result<Option<(Transaction, u64)>, BlockStoreError> {
        match self.kv.read().unwrap().get(&tx_key(hash))? {
            Some(bytes) => {
                let stored: StoredTransaction = bincode::deserialize(&bytes)?;
                Ok(Some((stored.transaction, stored.height)))
            }
            None => Ok(None),
        }
    }

    pub fn contain_transaction(&self, hash: &Hash) -> Result<bool, BlockStoreError> {
        Ok(self.kv.read().unwrap().exists(&tx_key(hash))?)
    }

    /// System-fee amount already consumed by `account`, or 0 if never
    /// recorded (SPEC-9 supplemented feature: sys-fee ledger).
    pub fn get_sys_fee_amount(&self, account: &Hash) -> Result<u64, BlockStoreError> {
        match self.kv.read().unwrap().get(&sysfee_key(account))? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| BlockStoreError::Serialization("malformed sys fee".into()))?;
                Ok(u64::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    pub fn save_sys_fee_amount(
        &self,
        account: &Hash,
        amount: u64,
        batch: &mut Batch,
    ) -> Result<(), BlockStoreError> {
        batch.put(sysfee_key(account), amount.to_le_bytes().to_vec());
        Ok(())
    }

    /// The full header index, in height order. In-memory list is
    /// authoritative; unflushed tail entries are included.
    pub fn get_header_index_list(&self) -> Vec<Hash> {
        self.header_index.read().unwrap().hashes.clone()
    }

    pub fn header_index_len(&self) -> u64 {
        self.header_index.read().unwrap().hashes.len() as u64
    }

    pub fn get_hash_by_index(&self, height: u64) -> Option<Hash> {
        self.header_index
            .read()
            .unwrap()
            .hashes
            .get(height as usize)
            .copied()
    }

    pub fn close(self) {
        drop(self._lock);
    }
}

impl<KV: KeyValueStore> Default for BlockStore<KV>
where
    KV: Default,
{
    fn default() -> Self {
        Self::open(KV::default()).expect("opening an empty store cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKVStore;
    use ledger_types::{Payload, TxType, ZERO_HASH};

    fn sample_block(height: u64, prev: Hash) -> Block {
        let tx = Transaction::new(TxType::Invoke, Payload::Invoke { code: vec![1, 2, 3] }, height);
        let header = Header {
            height,
            prev_block_hash: prev,
            timestamp: 1000 + height,
            transactions_root: tx.hash(),
            next_bookkeeper: [9u8; 32],
            bookkeepers: Vec::new(),
            sig_data: Vec::new(),
            consensus_payload: Vec::new(),
        };
        Block {
            header,
            transactions: vec![tx],
        }
    }

    #[test]
    fn test_save_and_get_block_roundtrip() {
        let store = BlockStore::open(InMemoryKVStore::new()).unwrap();
        let block = sample_block(0, ZERO_HASH);

        let mut batch = store.new_batch();
        store.save_block(&block, &mut batch).unwrap();
        store.commit_to(batch).unwrap();

        let fetched = store.get_block(0).unwrap().expect("block present");
        assert_eq!(fetched.hash(), block.hash());
        assert!(store.contain_block(&block.hash()).unwrap());
    }

    #[test]
    fn test_transaction_index() {
        let store = BlockStore::open(InMemoryKVStore::new()).unwrap();
        let block = sample_block(0, ZERO_HASH);
        let tx_hash = block.transactions[0].hash();

        let mut batch = store.new_batch();
        store.save_block(&block, &mut batch).unwrap();
        store.commit_to(batch).unwrap();

        assert!(store.contain_transaction(&tx_hash).unwrap());
        let (tx, height) = store.get_transaction(&tx_hash).unwrap().expect("tx present");
        assert_eq!(tx.hash(), tx_hash);
        assert_eq!(height, 0);
    }

    #[test]
    fn test_missing_block_returns_none() {
        let store = BlockStore::open(InMemoryKVStore::new()).unwrap();
        assert!(store.get_block(42).unwrap().is_none());
        assert_eq!(store.get_sys_fee_amount(&[1u8; 32]).unwrap(), 0);
    }

    #[test]
    fn test_header_index_grows_in_order() {
        let store = BlockStore::open(InMemoryKVStore::new()).unwrap();
        let mut prev = ZERO_HASH;
        for height in 0..5u64 {
            let block = sample_block(height, prev);
            prev = block.hash();
            let mut batch = store.new_batch();
            store.save_block(&block, &mut batch).unwrap();
            store.commit_to(batch).unwrap();
        }

        let index = store.get_header_index_list();
        assert_eq!(index.len(), 5);
        assert_eq!(store.header_index_len(), 5);
    }

    #[test]
    fn test_header_index_flushes_at_batch_size() {
        let store = BlockStore::open(InMemoryKVStore::new()).unwrap();
        let mut prev = ZERO_HASH;
        for height in 0..(HEADER_INDEX_BATCH_SIZE + 10) {
            let block = sample_block(height, prev);
            prev = block.hash();
            let mut batch = store.new_batch();
            store.save_block(&block, &mut batch).unwrap();
            store.commit_to(batch).unwrap();
        }

        assert_eq!(
            store.header_index_len(),
            HEADER_INDEX_BATCH_SIZE + 10
        );

        // Reopening should replay the flushed batch from the kv store and
        // keep the same total length (the unflushed tail of 10 is lost on a
        // real reopen in this in-memory test, since nothing durable backs
        // it across instances here -- but the flushed prefix must survive).
        let flushed_len = store.header_index.read().unwrap().flushed_len;
        assert_eq!(flushed_len as u64, HEADER_INDEX_BATCH_SIZE);
    }

    #[test]
    fn test_current_block_roundtrip() {
        let store = BlockStore::open(InMemoryKVStore::new()).unwrap();
        assert!(store.get_current_block().unwrap().is_none());

        store.save_current_block(7, [3u8; 32]).unwrap();
        let cur = store.get_current_block().unwrap().unwrap();
        assert_eq!(cur.height, 7);
        assert_eq!(cur.hash, [3u8; 32]);
    }

    #[test]
    fn test_current_block_to_batch_roundtrip() {
        let store = BlockStore::open(InMemoryKVStore::new()).unwrap();
        let mut batch = store.new_batch();
        store.save_current_block_to_batch(9, [4u8; 32], &mut batch).unwrap();
        assert!(store.get_current_block().unwrap().is_none());

        store.commit_to(batch).unwrap();
        let cur = store.get_current_block().unwrap().unwrap();
        assert_eq!(cur.height, 9);
        assert_eq!(cur.hash, [4u8; 32]);
    }

    #[test]
    fn test_version_roundtrip() {
        let store = BlockStore::open(InMemoryKVStore::new()).unwrap();
        assert_eq!(store.get_version().unwrap(), None);
        store.save_version(1).unwrap();
        assert_eq!(store.get_version().unwrap(), Some(1));
    }

    #[test]
    fn test_reopen_replays_flushed_header_index() {
        let mut kv = InMemoryKVStore::new();
        {
            let store = BlockStore::open(InMemoryKVStore::new()).unwrap();
            let mut prev = ZERO_HASH;
            for height in 0..HEADER_INDEX_BATCH_SIZE {
                let block = sample_block(height, prev);
                prev = block.hash();
                let mut batch = store.new_batch();
                store.save_block(&block, &mut batch).unwrap();
                store.commit_to(batch).unwrap();
            }
            // migrate the underlying data into `kv` to simulate reopening
            // the same backing store in a fresh `BlockStore`.
            for (k, v) in store.kv.read().unwrap().prefix_scan(b"").unwrap() {
                kv.put(&k, &v).unwrap();
            }
        }

        let reopened = BlockStore::open(kv).unwrap();
        assert_eq!(reopened.header_index_len(), HEADER_INDEX_BATCH_SIZE);
    }
}

//! # Overlay / CacheDB
//!
//! The in-memory staging layers a block executes against (SPEC-3, SPEC-9
//! "Overlay/CacheDB cyclic ownership"). `Overlay` wraps a read-only
//! snapshot of the persistent KV and accumulates a whole block's writes;
//! `CacheDB` is a thin per-transaction scratch layered on top, reset
//! between transactions rather than reallocated, and merged back into the
//! overlay only on success.
//!
//! Modeled as an arena with stack discipline (SPEC-9): the `Overlay`
//! outlives every `CacheDB` it spawns because `CacheDB` only ever borrows
//! it, never owns it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::RwLockReadGuard;

use ledger_types::{Hash, ScratchDb};
use sha2::{Digest, Sha256};

use ledger_block_store::kv::KeyValueStore;

/// A snapshot of the persistent state KV plus the writes accumulated by
/// executing a block's transactions against it. Reads fall through to the
/// snapshot when not shadowed by a write.
///
/// Interior mutability (`RefCell`) lets `get`/`set` take `&self`, so a
/// `CacheDB` only needs a shared borrow of its overlay — see module docs.
pub struct Overlay<'a, KV: KeyValueStore> {
    base: RwLockReadGuard<'a, KV>,
    writes: RefCell<HashMap<Vec<u8>, Option<Vec<u8>>>>,
    error: RefCell<Option<String>>,
}

impl<'a, KV: KeyValueStore> Overlay<'a, KV> {
    pub fn new(base: RwLockReadGuard<'a, KV>) -> Self {
        Self {
            base,
            writes: RefCell::new(HashMap::new()),
            error: RefCell::new(None),
        }
    }

    /// Read through the overlay's pending writes to the persistent
    /// snapshot. A KV I/O fault is recorded on `error` rather than
    /// propagated, matching SPEC-4.5's "a non-nil overlay.Error() is fatal
    /// to the block" (the caller checks `error()` once per block, not
    /// once per read).
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(pending) = self.writes.borrow().get(key) {
            return pending.clone();
        }
        match self.base.get(key) {
            Ok(v) => v,
            Err(e) => {
                *self.error.borrow_mut() = Some(e.to_string());
                None
            }
        }
    }

    pub fn set(&self, key: Vec<u8>, value: Option<Vec<u8>>) {
        self.writes.borrow_mut().insert(key, value);
    }

    /// The first fatal I/O error seen through this overlay, if any.
    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    /// A digest over the overlay's accumulated key/value mutations
    /// (SPEC glossary "State-Change Hash"), deterministic regardless of
    /// insertion order.
    pub fn change_hash(&self) -> Hash {
        let mut entries = self.drain_writes_preview();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut hasher = Sha256::new();
        for (key, value) in &entries {
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key);
            match value {
                Some(v) => {
                    hasher.update([1u8]);
                    hasher.update((v.len() as u64).to_le_bytes());
                    hasher.update(v);
                }
                None => hasher.update([0u8]),
            }
        }
        hasher.finalize().into()
    }

    fn drain_writes_preview(&self) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        self.writes
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Take the accumulated writes, sorted by key, for merging into the
    /// persistent KV's batch.
    pub fn take_writes(&self) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        let mut entries = self.drain_writes_preview();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.writes.borrow().is_empty()
    }
}

/// A per-transaction scratch layer over an `Overlay`. Resettable between
/// transactions (SPEC-9) instead of being reallocated each time.
pub struct CacheDB<'o, 'a, KV: KeyValueStore> {
    overlay: &'o Overlay<'a, KV>,
    writes: HashMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'o, 'a, KV: KeyValueStore> CacheDB<'o, 'a, KV> {
    pub fn new(overlay: &'o Overlay<'a, KV>) -> Self {
        Self {
            overlay,
            writes: HashMap::new(),
        }
    }

    /// Discard this transaction's writes without touching the overlay
    /// (failure or per-tx rollback, SPEC-3).
    pub fn reset(&mut self) {
        self.writes.clear();
    }

    /// Fold this transaction's writes into the overlay (success path) and
    /// clear the scratch layer for reuse by the next transaction.
    pub fn commit(&mut self) {
        for (key, value) in self.writes.drain() {
            self.overlay.set(key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl<'o, 'a, KV: KeyValueStore> ScratchDb for CacheDB<'o, 'a, KV> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(pending) = self.writes.get(key) {
            return pending.clone();
        }
        self.overlay.get(key)
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) {
        self.writes.insert(key.to_vec(), Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_block_store::kv::InMemoryKVStore;
    use std::sync::RwLock;

    #[test]
    fn test_overlay_reads_fall_through_to_base() {
        let mut kv = InMemoryKVStore::new();
        kv.put(b"k", b"v").unwrap();
        let lock = RwLock::new(kv);
        let overlay = Overlay::new(lock.read().unwrap());

        assert_eq!(overlay.get(b"k"), Some(b"v".to_vec()));
        assert_eq!(overlay.get(b"missing"), None);
    }

    #[test]
    fn test_cachedb_reset_discards_writes() {
        let kv = InMemoryKVStore::new();
        let lock = RwLock::new(kv);
        let overlay = Overlay::new(lock.read().unwrap());
        let mut cache = CacheDB::new(&overlay);

        cache.put(b"a", b"1".to_vec());
        cache.reset();
        assert_eq!(ScratchDb::get(&cache, b"a"), None);
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_cachedb_commit_merges_into_overlay() {
        let kv = InMemoryKVStore::new();
        let lock = RwLock::new(kv);
        let overlay = Overlay::new(lock.read().unwrap());
        let mut cache = CacheDB::new(&overlay);

        cache.put(b"a", b"1".to_vec());
        cache.commit();

        assert_eq!(overlay.get(b"a"), Some(b"1".to_vec()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cachedb_second_tx_sees_first_txs_committed_write() {
        let kv = InMemoryKVStore::new();
        let lock = RwLock::new(kv);
        let overlay = Overlay::new(lock.read().unwrap());
        let mut cache = CacheDB::new(&overlay);

        cache.put(b"a", b"1".to_vec());
        cache.commit();
        cache.reset();

        assert_eq!(ScratchDb::get(&cache, b"a"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_change_hash_is_order_independent() {
        let kv = InMemoryKVStore::new();
        let lock = RwLock::new(kv);
        let overlay_a = Overlay::new(lock.read().unwrap());
        overlay_a.set(b"a".to_vec(), Some(b"1".to_vec()));
        overlay_a.set(b"b".to_vec(), Some(b"2".to_vec()));

        let overlay_b = Overlay::new(lock.read().unwrap());
        overlay_b.set(b"b".to_vec(), Some(b"2".to_vec()));
        overlay_b.set(b"a".to_vec(), Some(b"1".to_vec()));

        assert_eq!(overlay_a.change_hash(), overlay_b.change_hash());
    }

    #[test]
    fn test_change_hash_differs_on_value_change() {
        let kv = InMemoryKVStore::new();
        let lock = RwLock::new(kv);
        let overlay_a = Overlay::new(lock.read().unwrap());
        overlay_a.set(b"a".to_vec(), Some(b"1".to_vec()));
        let h1 = overlay_a.change_hash();

        overlay_a.set(b"a".to_vec(), Some(b"2".to_vec()));
        let h2 = overlay_a.change_hash();

        assert_ne!(h1, h2);
    }
}

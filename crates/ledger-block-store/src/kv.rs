//! # Key-Value Port
//!
//! The storage abstraction `BlockStore` (and, via the same trait, the
//! state/event stores) is built on. Grounded on
//! `qc-02-block-storage::ports::outbound::KeyValueStore`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from key-value operations.
#[derive(Debug, Error, Clone)]
pub enum KVStoreError {
    #[error("KV store I/O error: {0}")]
    Io(String),
    #[error("KV store corruption: {0}")]
    Corruption(String),
}

/// A single write in an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// A collected batch of writes, applied atomically on `commit_to`
/// (SPEC-4.1: "Open fresh batches on all three stores", "Commit in the
/// order block -> event -> state").
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOperation>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOperation::put(key, value));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOperation::delete(key));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOperation> {
        self.ops
    }
}

/// Abstract interface for key-value database operations. Production: a
/// file-backed store (below); tests: the in-memory store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;
    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;
    /// Either all operations apply, or (on error) none do.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
    fn clear_all(&mut self) -> Result<(), KVStoreError>;
}

/// In-memory key-value store for unit tests.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: HashMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(self
            .data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn clear_all(&mut self) -> Result<(), KVStoreError> {
        self.data.clear();
        Ok(())
    }
}

/// File-backed key-value store: whole-file snapshot with atomic
/// rename-on-write, for production use without pulling in an embedded DB
/// engine. Grounded on `qc-02-block-storage::ports::outbound::FileBackedKVStore`.
pub struct FileBackedKVStore {
    data: HashMap<Vec<u8>, Vec<u8>>,
    path: PathBuf,
}

impl FileBackedKVStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KVStoreError::Io(e.to_string()))?;
        }
        let data = Self::load_from_file(&path).unwrap_or_default();
        Ok(Self { data, path })
    }

    fn load_from_file(path: &Path) -> Option<HashMap<Vec<u8>, Vec<u8>>> {
        let mut file = std::fs::File::open(path).ok()?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).ok()?;

        let mut data = HashMap::new();
        let mut cursor = 0;
        while cursor + 4 <= bytes.len() {
            let key_len = u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().ok()?) as usize;
            cursor += 4;
            if cursor + key_len > bytes.len() {
                break;
            }
            let key = bytes[cursor..cursor + key_len].to_vec();
            cursor += key_len;

            if cursor + 4 > bytes.len() {
                break;
            }
            let value_len = u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().ok()?) as usize;
            cursor += 4;
            if cursor + value_len > bytes.len() {
                break;
            }
            let value = bytes[cursor..cursor + value_len].to_vec();
            cursor += value_len;

            data.insert(key, value);
        }
        Some(data)
    }

    fn save_to_file(&self) -> Result<(), KVStoreError> {
        let mut bytes = Vec::new();
        for (key, value) in &self.data {
            bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
            bytes.extend_from_slice(value);
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file =
            std::fs::File::create(&temp_path).map_err(|e| KVStoreError::Io(e.to_string()))?;
        file.write_all(&bytes)
            .map_err(|e| KVStoreError::Io(e.to_string()))?;
        file.sync_all().map_err(|e| KVStoreError::Io(e.to_string()))?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| KVStoreError::Io(e.to_string()))?;
        Ok(())
    }
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        self.save_to_file()
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.remove(key);
        self.save_to_file()
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        self.save_to_file()
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(self
            .data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn clear_all(&mut self) -> Result<(), KVStoreError> {
        self.data.clear();
        self.save_to_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_batch_write() {
        let mut store = InMemoryKVStore::new();
        let mut batch = Batch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        store.atomic_batch_write(batch.into_ops()).unwrap();

        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_prefix_scan() {
        let mut store = InMemoryKVStore::new();
        store.put(b"blk:1", b"x").unwrap();
        store.put(b"blk:2", b"y").unwrap();
        store.put(b"h2b:1", b"z").unwrap();

        assert_eq!(store.prefix_scan(b"blk:").unwrap().len(), 2);
        assert_eq!(store.prefix_scan(b"h2b:").unwrap().len(), 1);
    }

    #[test]
    fn test_file_backed_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let mut store = FileBackedKVStore::open(&path).unwrap();
            store.put(b"k", b"v").unwrap();
        }

        let store = FileBackedKVStore::open(&path).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_file_backed_survives_reopen_after_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let mut store = FileBackedKVStore::open(&path).unwrap();
            let mut batch = Batch::new();
            batch.put(b"a".to_vec(), b"1".to_vec());
            store.atomic_batch_write(batch.into_ops()).unwrap();
        }

        let store = FileBackedKVStore::open(&path).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    }
}

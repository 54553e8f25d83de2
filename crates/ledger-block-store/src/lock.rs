//! # Data Directory Lock
//!
//! Advisory exclusive lock over the ledger's data directory, so two node
//! processes never open the same store concurrently. Grounded on
//! `qc-02-block-storage::adapters::lock::flock::DatabaseLock`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::errors::BlockStoreError;

const LOCK_FILE_NAME: &str = "LOCK";

/// Holds an exclusive `flock` on `<data_dir>/LOCK` for the lifetime of the
/// value. Dropping it releases the lock.
pub struct DatabaseLock {
    _file: File,
    path: PathBuf,
}

impl DatabaseLock {
    /// Acquire the lock, creating the data directory if needed. Fails
    /// immediately (non-blocking) if another process already holds it.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self, BlockStoreError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(|e| BlockStoreError::Io(e.to_string()))?;
        let path = data_dir.join(LOCK_FILE_NAME);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| BlockStoreError::Io(e.to_string()))?;

        file.try_lock_exclusive().map_err(|_| {
            BlockStoreError::DirectoryLocked(path.display().to_string())
        })?;

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

//! # Ledger
//!
//! The coordinator SPEC-1 through SPEC-6 describe: opens the three
//! sub-stores, runs genesis bring-up or crash recovery, and serves
//! `AddHeader(s)`/`AddBlock`/the read path/`PreExecuteContract` on top of
//! them. Grounded on `qc-02-block-storage::service::BlockStorageService` +
//! `BlockStorageDependencies` for the "generic service, DI struct, concrete
//! constructors per backend" shape.

mod blocks;
mod genesis;
mod headers;
mod reads;
mod recovery;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

use ledger_block_store::{BlockStore, FileBackedKVStore, InMemoryKVStore};
use ledger_bus::EventPublisher;
use ledger_event_store::EventStore;
use ledger_execution::ExecutionEngine;
use ledger_state_store::StateStore;
use ledger_types::{LedgerConfig, SmartContractVm};

use crate::errors::LedgerError;
use crate::state::SharedState;

/// External collaborators a `Ledger` needs at construction time, in lieu of
/// a package-level singleton (SPEC_FULL B.4; mirrors
/// `qc-02-block-storage::service::BlockStorageDependencies`).
pub struct LedgerDependencies {
    pub config: LedgerConfig,
    pub publisher: Arc<dyn EventPublisher>,
    pub vm: Box<dyn SmartContractVm>,
}

/// The ledger storage engine: block/state/event persistence, header-first
/// sync, full block append plus execution, and VBFT bookkeeper bookkeeping,
/// behind one coordinator (SPEC-1 OVERVIEW).
pub struct Ledger<KV: ledger_block_store::KeyValueStore> {
    pub(crate) config: LedgerConfig,
    pub(crate) block_store: BlockStore<KV>,
    pub(crate) state_store: StateStore<KV>,
    pub(crate) event_store: EventStore<KV>,
    pub(crate) execution: ExecutionEngine,
    pub(crate) publisher: Arc<dyn EventPublisher>,
    pub(crate) shared: RwLock<SharedState>,
    pub(crate) saving_block: AtomicBool,
}

impl Ledger<FileBackedKVStore> {
    /// Open a file-backed ledger rooted at `data_dir`, creating
    /// `{data_dir}/{block,states,ledgerevent}` as needed. Each sub-store
    /// takes its own advisory directory lock (SPEC_FULL B.6).
    pub fn open<P: AsRef<Path>>(data_dir: P, deps: LedgerDependencies) -> Result<Self, LedgerError> {
        let data_dir = data_dir.as_ref();
        let block_store = BlockStore::open_file_backed(data_dir.join("block"))?;
        let state_store = StateStore::open_file_backed(data_dir.join("states"))?;
        let event_store = EventStore::open_file_backed(data_dir.join("ledgerevent"))?;
        Ok(Self::assemble(block_store, state_store, event_store, deps))
    }
}

impl Ledger<InMemoryKVStore> {
    /// Open an in-memory ledger (tests, or a throwaway node).
    pub fn open_in_memory(deps: LedgerDependencies) -> Self {
        let block_store = BlockStore::open_in_memory();
        let state_store = StateStore::open_in_memory();
        let event_store = EventStore::open_in_memory();
        Self::assemble(block_store, state_store, event_store, deps)
    }
}

impl<KV: ledger_block_store::KeyValueStore> Ledger<KV> {
    fn assemble(
        block_store: BlockStore<KV>,
        state_store: StateStore<KV>,
        event_store: EventStore<KV>,
        deps: LedgerDependencies,
    ) -> Self {
        Self {
            config: deps.config,
            block_store,
            state_store,
            event_store,
            execution: ExecutionEngine::new(deps.vm),
            publisher: deps.publisher,
            shared: RwLock::new(SharedState::default()),
            saving_block: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Release the sub-stores' directory locks. Consumes `self`.
    pub fn close(self) {
        self.block_store.close();
        self.state_store.close();
        self.event_store.close();
    }
}

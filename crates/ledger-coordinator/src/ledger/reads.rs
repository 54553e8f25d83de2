//! The read path: everything that does not mutate the ledger (SPEC-7).

use ledger_block_store::KeyValueStore;
use ledger_execution::PreExecuteResult;
use ledger_state_store::{CacheDB, MerkleProof};
use ledger_types::{BookkeeperState, ExecuteNotify, Hash, Header, Transaction, ZERO_HASH};

use super::Ledger;
use crate::errors::LedgerError;

impl<KV: KeyValueStore> Ledger<KV> {
    /// Look a header up by hash, checking the in-memory header cache
    /// first (headers accepted ahead of their block) and falling back to
    /// the durable block store (SPEC-2, SPEC-7).
    pub fn get_header_by_hash(&self, hash: &Hash) -> Result<Option<Header>, LedgerError> {
        if *hash == ZERO_HASH {
            return Ok(None);
        }
        if let Some(header) = self.shared.read().unwrap().header_cache.get(hash).cloned() {
            return Ok(Some(header));
        }
        Ok(self.block_store.get_block_by_hash(hash)?.map(|b| b.header))
    }

    pub fn get_header_by_height(&self, height: u64) -> Result<Option<Header>, LedgerError> {
        Ok(self.block_store.get_header(height)?)
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<ledger_types::Block>, LedgerError> {
        Ok(self.block_store.get_block_by_hash(hash)?)
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Option<ledger_types::Block>, LedgerError> {
        Ok(self.block_store.get_block(height)?)
    }

    pub fn get_block_hash(&self, height: u64) -> Result<Option<Hash>, LedgerError> {
        Ok(self.block_store.get_block_hash(height)?)
    }

    pub fn get_transaction(&self, hash: &Hash) -> Result<Option<(Transaction, u64)>, LedgerError> {
        Ok(self.block_store.get_transaction(hash)?)
    }

    pub fn is_contain_block(&self, hash: &Hash) -> Result<bool, LedgerError> {
        Ok(self.block_store.contain_block(hash)?)
    }

    pub fn is_contain_transaction(&self, hash: &Hash) -> Result<bool, LedgerError> {
        Ok(self.block_store.contain_transaction(hash)?)
    }

    pub fn get_sys_fee_amount(&self, account: &Hash) -> Result<u64, LedgerError> {
        Ok(self.block_store.get_sys_fee_amount(account)?)
    }

    pub fn get_current_block_height(&self) -> u64 {
        self.shared.read().unwrap().current_block_height
    }

    pub fn get_current_block_hash(&self) -> Hash {
        self.shared.read().unwrap().current_block_hash
    }

    pub fn get_current_header_height(&self) -> u64 {
        self.shared.read().unwrap().current_header_height
    }

    pub fn get_current_header_hash(&self) -> Hash {
        self.shared.read().unwrap().current_header_hash
    }

    pub fn get_event_notify_by_tx(&self, hash: &Hash) -> Result<Option<ExecuteNotify>, LedgerError> {
        Ok(self.event_store.get_event_notify_by_tx(hash)?)
    }

    pub fn get_event_notify_by_block(&self, height: u64) -> Result<Vec<Hash>, LedgerError> {
        Ok(self.event_store.get_event_notify_by_block(height)?)
    }

    pub fn get_bookkeeper_state(&self) -> Result<Option<BookkeeperState>, LedgerError> {
        Ok(self.state_store.get_bookkeeper_state()?)
    }

    pub fn get_contract_state(&self, contract: &Hash) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.state_store.get_contract_state(contract)?)
    }

    pub fn get_storage_item(&self, contract: &Hash, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.state_store.get_storage_state(contract, key)?)
    }

    pub fn get_block_root_with_new_tx_root(&self, tx_root: Hash) -> Hash {
        self.state_store.get_block_root_with_new_tx_root(tx_root)
    }

    pub fn get_merkle_proof(&self, proof_height: u64, root_height: u64) -> Result<MerkleProof, LedgerError> {
        Ok(self.state_store.get_merkle_proof(proof_height, root_height)?)
    }

    /// No-commit contract simulation against a throwaway overlay on top of
    /// the current state (SPEC-4.5 `PreExecuteContract`).
    pub fn pre_execute_contract(&self, tx: &Transaction) -> Result<PreExecuteResult, LedgerError> {
        let overlay = self.state_store.new_overlay();
        let mut cache = CacheDB::new(&overlay);
        let result = self.execution.pre_execute_contract(&mut cache, tx)?;
        Ok(result)
    }
}

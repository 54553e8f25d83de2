//! Full block append: verify, execute, commit in block -> event -> state
//! order, publish (SPEC-3, SPEC-4.1, SPEC-5).

use std::sync::atomic::Ordering;

use ledger_block_store::{Batch, KeyValueStore};
use ledger_bus::SaveBlockCompleteMsg;
use ledger_execution::ExecutionError;
use ledger_header_verifier::verify_header;
use ledger_state_store::CacheDB;
use ledger_types::Block;
use tracing::{debug, info, warn};

use super::Ledger;
use crate::errors::LedgerError;

impl<KV: KeyValueStore> Ledger<KV> {
    /// Append `block` as the new tip. Height <= current tip is a silent
    /// no-op (SPEC-3 edge case: duplicate/stale delivery); height that
    /// skips ahead is an error; a concurrent save already in flight makes
    /// this call a no-op too (SPEC-5 single-flight guard).
    pub fn add_block(&self, block: Block) -> Result<(), LedgerError> {
        let height = block.height();
        {
            let shared = self.shared.read().unwrap();
            if height <= shared.current_block_height {
                debug!(height, tip = shared.current_block_height, "add_block: stale/duplicate, ignoring");
                return Ok(());
            }
            if height != shared.current_block_height + 1 {
                return Err(LedgerError::HeightGap {
                    expected: shared.current_block_height + 1,
                    got: height,
                });
            }
        }

        if self
            .saving_block
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(height, "add_block: a save is already in flight, ignoring");
            return Ok(());
        }
        let result = self.add_block_locked(block);
        self.saving_block.store(false, Ordering::SeqCst);
        result
    }

    fn add_block_locked(&self, block: Block) -> Result<(), LedgerError> {
        let height = block.height();
        {
            let shared = self.shared.read().unwrap();
            if height <= shared.current_block_height {
                return Ok(());
            }
            if height != shared.current_block_height + 1 {
                return Err(LedgerError::HeightGap {
                    expected: shared.current_block_height + 1,
                    got: height,
                });
            }
        }

        let prev_header = self.get_header_by_hash(&block.header.prev_block_hash)?;
        let peer_set = self.shared.read().unwrap().vbft_peer_info_block.clone();
        let new_peer_set = verify_header(
            prev_header.as_ref(),
            &block.header,
            &peer_set,
            self.config.consensus_type,
        )?;

        self.commit_block(&block)?;

        {
            let mut shared = self.shared.write().unwrap();
            shared.current_block_height = height;
            shared.current_block_hash = block.hash();
            if let Some(cfg) = new_peer_set {
                shared.vbft_peer_info_block = cfg;
            }
            shared.header_cache.remove(&block.hash());
            if !shared.header_tail.is_empty() {
                shared.header_tail.remove(0);
            }
        }

        info!(height, "block saved");
        self.publisher.publish_save_block_complete(SaveBlockCompleteMsg { block });
        Ok(())
    }

    /// Persist a full block: block body + height->hash + tx index + header
    /// index entry (block store), then the per-tx execute-notifies and
    /// per-block tx list (event store), then the Merkle root append and
    /// overlay writes (state store) — committed in that order so a crash
    /// mid-save never leaves state ahead of the events that produced it
    /// (SPEC-4.1 "commit in the order block -> event -> state").
    pub(crate) fn commit_block(&self, block: &Block) -> Result<(), LedgerError> {
        let height = block.height();
        let hash = block.hash();

        let mut block_batch = self.block_store.new_batch();
        self.block_store.save_block(block, &mut block_batch)?;
        self.block_store
            .save_current_block_to_batch(height, hash, &mut block_batch)?;

        let (event_batch, state_batch) = self.stage_state_and_event(block)?;

        self.block_store.commit_to(block_batch)?;
        self.event_store.commit_to(event_batch)?;
        self.state_store.commit_to(state_batch)?;
        Ok(())
    }

    /// Execute `block`'s transactions against a fresh overlay and stage the
    /// resulting event/state writes without committing either (shared by
    /// the normal save path and crash-recovery replay, SPEC-6).
    pub(crate) fn stage_state_and_event(
        &self,
        block: &Block,
    ) -> Result<(Batch, Batch), LedgerError> {
        let height = block.height();
        let hash = block.hash();
        let is_genesis = height == 0;

        let overlay = self.state_store.new_overlay();
        let mut cache = CacheDB::new(&overlay);
        if !is_genesis {
            self.execution.refresh_global_param(&cache)?;
        }

        let mut event_batch = self.event_store.new_batch();
        let mut tx_hashes = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            cache.reset();
            let notify = self
                .execution
                .handle_transaction(&overlay, &mut cache, tx)
                .map_err(|e| match e {
                    ExecutionError::OverlayFatal(msg) => LedgerError::Fatal(msg),
                    other => {
                        warn!(tx_hash = ?tx.hash(), error = %other, "unexpected handler error surfaced past handle_transaction");
                        LedgerError::Execution(other)
                    }
                })?;
            self.event_store.save_notify(tx.hash(), &notify, &mut event_batch)?;
            tx_hashes.push(tx.hash());
        }
        self.event_store
            .save_event_notify_by_block(height, &tx_hashes, &mut event_batch)?;
        self.event_store.save_current_block(height, hash, &mut event_batch)?;

        let mut state_batch = self.state_store.new_batch();
        self.state_store
            .add_merkle_tree_root(block.header.transactions_root, &mut state_batch)?;
        self.state_store.save_current_block(height, hash, &mut state_batch)?;

        let change_hash = overlay.change_hash();
        debug!(height, change_hash = ?change_hash, "state-change hash computed");
        for (key, value) in overlay.take_writes() {
            match value {
                Some(v) => state_batch.put(key, v),
                None => state_batch.delete(key),
            }
        }

        // The overlay holds a read guard on the state store's KV; it must
        // be gone before `commit_to` takes the write lock on the same
        // store, or this deadlocks (SPEC-9 Overlay/CacheDB lifetime note).
        drop(cache);
        drop(overlay);

        Ok((event_batch, state_batch))
    }
}

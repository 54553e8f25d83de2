//! Crash recovery: bring the state and event stores back up to the block
//! store's tip by replaying whatever blocks are ahead of them (SPEC-6).

use ledger_block_store::KeyValueStore;
use tracing::{info, warn};

use super::Ledger;
use crate::errors::LedgerError;

impl<KV: KeyValueStore> Ledger<KV> {
    /// The block store is the durability anchor: its `current_block`
    /// pointer is written last in `commit_block`'s block batch, but that
    /// batch itself commits *before* the event/state batches, so a crash
    /// can leave state and/or events behind the block tip, never ahead of
    /// it. Recovery replays every height from the state store's own tip
    /// (inclusive, since that height's state may never have been durably
    /// committed) through the block tip.
    pub(crate) fn recover(&self) -> Result<(), LedgerError> {
        let block_tip = self
            .block_store
            .get_current_block()?
            .map(|cb| cb.height)
            .unwrap_or(0);
        let state_tip = self
            .state_store
            .get_current_block()?
            .map(|(h, _)| h)
            .unwrap_or(0);

        self.state_store.check_storage()?;

        if state_tip >= block_tip {
            info!(block_tip, state_tip, "recovery: state/event stores already at block tip");
            let tip_hash = self.block_store.get_current_block()?.map(|cb| cb.hash);
            let mut shared = self.shared.write().unwrap();
            shared.current_block_height = block_tip;
            shared.current_header_height = block_tip;
            if let Some(hash) = tip_hash {
                shared.current_block_hash = hash;
                shared.current_header_hash = hash;
            }
            return Ok(());
        }

        let replay_start = if state_tip == 0 { 0 } else { state_tip };
        warn!(
            from = replay_start,
            to = block_tip,
            "recovery: replaying state/event writes for blocks the block store already has"
        );
        for height in replay_start..=block_tip {
            self.replay_into_state_and_event(height)?;
        }

        let tip_hash = self
            .block_store
            .get_hash_by_index(block_tip)
            .ok_or_else(|| LedgerError::Fatal(format!("recovery: no header index entry at height {block_tip}")))?;
        let mut shared = self.shared.write().unwrap();
        shared.current_block_height = block_tip;
        shared.current_block_hash = tip_hash;
        shared.current_header_height = block_tip;
        shared.current_header_hash = tip_hash;
        Ok(())
    }

    /// Re-run one already-persisted block's transactions and stage the
    /// resulting event/state writes, committing event then state (the
    /// block itself is already durable, so it is not re-written).
    fn replay_into_state_and_event(&self, height: u64) -> Result<(), LedgerError> {
        let block = self
            .block_store
            .get_block(height)?
            .ok_or_else(|| LedgerError::Fatal(format!("recovery: block at height {height} missing from block store")))?;

        let (event_batch, state_batch) = self.stage_state_and_event(&block)?;
        self.event_store.commit_to(event_batch)?;
        self.state_store.commit_to(state_batch)?;
        Ok(())
    }
}

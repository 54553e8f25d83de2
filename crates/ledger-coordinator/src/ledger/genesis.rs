//! Genesis bring-up and VBFT config bootstrap (SPEC-6 `InitWithGenesis`).

use ledger_block_store::KeyValueStore;
use ledger_types::{Block, BookkeeperState, ChainConfig, PeerInfo, PublicKey, SYSTEM_VERSION};
use tracing::info;

use super::Ledger;
use crate::errors::LedgerError;

impl<KV: KeyValueStore> Ledger<KV> {
    /// Install `genesis` as height 0 if no version marker is present, or
    /// verify it already matches and run crash recovery otherwise (SPEC-6).
    /// On success, a VBFT ledger also has its two peer-set copies primed
    /// from the active chain config.
    pub fn init_with_genesis(
        &self,
        genesis: Block,
        default_bookkeepers: Vec<PublicKey>,
    ) -> Result<(), LedgerError> {
        match self.block_store.get_version()? {
            None => {
                info!("no version marker found: installing genesis block");
                self.block_store.clear_all()?;
                self.state_store.clear_all()?;
                self.event_store.clear_all()?;

                let bookkeeper_state = BookkeeperState::genesis(default_bookkeepers);
                let mut state_batch = self.state_store.new_batch();
                self.state_store
                    .save_bookkeeper_state(&bookkeeper_state, &mut state_batch)?;
                self.state_store.commit_to(state_batch)?;

                self.commit_block(&genesis)?;
                self.block_store.save_version(SYSTEM_VERSION)?;

                let mut shared = self.shared.write().unwrap();
                shared.current_block_height = genesis.height();
                shared.current_block_hash = genesis.hash();
                shared.current_header_height = genesis.height();
                shared.current_header_hash = genesis.hash();
                drop(shared);
            }
            Some(_) => {
                let hash = genesis.hash();
                if !self.block_store.contain_block(&hash)? {
                    return Err(LedgerError::Fatal(
                        "version marker present but the genesis block is missing from the block store"
                            .into(),
                    ));
                }
                info!("version marker found: running crash recovery");
                self.recover()?;
            }
        }

        if self.config.consensus_type.is_vbft() {
            self.load_vbft_chain_config()?;
        }
        Ok(())
    }

    /// Load the active `ChainConfig` into both peer-set copies: the one
    /// carried by the current block if it is a config-boundary block, or
    /// found by walking `LastConfigBlockNum` back to one (SPEC-3, SPEC-6).
    /// Genesis itself carries no VBFT payload, so the walk bottoms out at
    /// the bookkeeper state seeded at genesis instead.
    pub(crate) fn load_vbft_chain_config(&self) -> Result<(), LedgerError> {
        let tip = self.shared.read().unwrap().current_block_height;
        let mut height = tip;

        let config = loop {
            let header = self.block_store.get_header(height)?.ok_or_else(|| {
                LedgerError::Fatal(format!("vbft bring-up: header at height {height} missing"))
            })?;
            let info = header.vbft_block_info()?;
            if let Some(cfg) = info.new_chain_config {
                break cfg;
            }
            match info.last_config_block_num {
                Some(prev) if prev < height => {
                    height = prev;
                    continue;
                }
                _ => {}
            }
            if height == 0 {
                let bookkeepers = self.state_store.get_bookkeeper_state()?.ok_or_else(|| {
                    LedgerError::Fatal("no bookkeeper state recorded at genesis".into())
                })?;
                break ChainConfig::new(
                    bookkeepers
                        .curr_bookkeeper
                        .iter()
                        .enumerate()
                        .map(|(i, pubkey)| PeerInfo {
                            pubkey: *pubkey,
                            index: i as u32,
                        })
                        .collect(),
                );
            }
            return Err(LedgerError::Fatal(
                "vbft bring-up: no NewChainConfig found while walking LastConfigBlockNum".into(),
            ));
        };

        let mut shared = self.shared.write().unwrap();
        shared.vbft_peer_info_header = config.clone();
        shared.vbft_peer_info_block = config;
        Ok(())
    }
}

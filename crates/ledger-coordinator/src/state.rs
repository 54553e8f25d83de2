//! # Coordinator-Shared State
//!
//! Everything `AddHeader`/`AddHeaders`/`AddBlock`/the read path touch under
//! the ledger's single reader-writer mutex (SPEC-5: "one RwLock guards
//! header cache, header index, current-block pointer, and the two
//! VBFT peer-set copies"). `savingBlock` lives outside this struct as its
//! own `AtomicBool` (SPEC_FULL B.6 design note: a compare-and-swap gate is
//! simpler to reason about than a bool guarded by the same lock it gates).

use std::collections::HashMap;

use ledger_types::{ChainConfig, Hash, Header, ZERO_HASH};

/// Headers admitted by `AddHeader` whose matching block has not yet been
/// saved, plus the dense tail of hashes for heights beyond
/// `current_block_height` (SPEC glossary "HeaderCache", "HeaderIndex").
/// Once a block at height `h` lands, the corresponding cache entry and
/// tail slot are dropped — the durable `BlockStore` header index is
/// authoritative for every height at or below the block tip from then on.
pub struct SharedState {
    pub header_cache: HashMap<Hash, Header>,
    pub header_tail: Vec<Hash>,
    pub current_header_height: u64,
    pub current_header_hash: Hash,
    pub current_block_height: u64,
    pub current_block_hash: Hash,
    pub vbft_peer_info_header: ChainConfig,
    pub vbft_peer_info_block: ChainConfig,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            header_cache: HashMap::new(),
            header_tail: Vec::new(),
            current_header_height: 0,
            current_header_hash: ZERO_HASH,
            current_block_height: 0,
            current_block_hash: ZERO_HASH,
            vbft_peer_info_header: ChainConfig::default(),
            vbft_peer_info_block: ChainConfig::default(),
        }
    }
}

//! # Ledger Node
//!
//! A thin demo runtime around the `ledger-coordinator` crate: opens a
//! file-backed `Ledger`, installs genesis if this is a fresh data
//! directory (or runs crash recovery otherwise), and idles until
//! interrupted. There is no P2P or RPC layer here — wiring those up is
//! left to whatever embeds this crate (SPEC-1 Out of scope).

use std::sync::Arc;

use anyhow::Result;
use ledger_block_store::FileBackedKVStore;
use ledger_coordinator::{Ledger, LedgerDependencies};
use ledger_crypto::KeyPair;
use ledger_execution::ReferenceVm;
use ledger_types::{Block, Header, LedgerConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Node configuration.
pub struct NodeConfig {
    /// Data directory for block/state/event storage.
    pub data_dir: String,
    /// Consensus family: VBFT or a fixed NextBookkeeper chain.
    pub consensus_type: ledger_types::ConsensusType,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            consensus_type: ledger_types::ConsensusType::Vbft,
        }
    }
}

/// Open (or recover) the ledger and install genesis on first run.
fn init_node(config: &NodeConfig) -> Result<Ledger<FileBackedKVStore>> {
    info!("Initializing ledger node...");
    info!("Data Dir: {}", config.data_dir);
    info!("Consensus: {:?}", config.consensus_type);

    let deps = LedgerDependencies {
        config: LedgerConfig {
            consensus_type: config.consensus_type,
            header_index_batch_size: ledger_types::HEADER_INDEX_BATCH_SIZE,
        },
        publisher: Arc::new(ledger_bus::InMemoryLedgerBus::new()),
        vm: Box::new(ReferenceVm::new()),
    };
    let ledger = Ledger::open(&config.data_dir, deps)?;

    // A single demo bookkeeper; a real deployment injects its own genesis
    // validator set here instead.
    let genesis_key = KeyPair::from_seed([1u8; 32]);
    let genesis = Block {
        header: Header::genesis([0u8; 32], [0u8; 32], 0),
        transactions: Vec::new(),
    };
    ledger.init_with_genesis(genesis, vec![genesis_key.public_key()])?;

    info!("Ledger node initialized successfully");
    info!(height = ledger.get_current_block_height(), "current block tip");
    Ok(ledger)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  Ledger Node Runtime v0.1.0");
    info!("===========================================");

    let config = NodeConfig::default();
    let ledger = init_node(&config)?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down gracefully...");
    ledger.close();

    Ok(())
}

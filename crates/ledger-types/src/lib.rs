//! # Ledger Types
//!
//! Shared domain entities for the ledger storage engine: blocks, headers,
//! transactions, the rolling bookkeeper/peer set, and the engine's
//! configuration surface.
//!
//! This is the Single Source of Truth for type definitions consumed by every
//! other `ledger-*` crate, the way `shared-types` anchors the rest of the
//! workspace it was copied from.

pub mod config;
pub mod entities;
pub mod errors;
pub mod execution;

pub use config::{ConsensusType, LedgerConfig};
pub use entities::{
    address_from_bookkeepers, bft_quorum, Block, BookkeeperState, ChainConfig, Header,
    Payload, PeerInfo, PublicKey, Signature, Transaction, TxType, VbftBlockInfo, Hash,
    HEADER_INDEX_BATCH_SIZE, SYSTEM_VERSION, ZERO_HASH,
};
pub use errors::LedgerTypesError;
pub use execution::{ExecuteNotify, Notification, NotifyState, ScratchDb, SmartContractVm, VmError};

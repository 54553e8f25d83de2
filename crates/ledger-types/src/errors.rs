//! # Error Types
//!
//! Errors raised while constructing or parsing ledger entities.

use thiserror::Error;

/// Errors surfaced by `ledger-types` itself (entity (de)serialization).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerTypesError {
    /// The opaque consensus payload on a header could not be decoded as a
    /// `VbftBlockInfo`.
    #[error("malformed VBFT consensus payload: {0}")]
    MalformedConsensusPayload(String),

    /// `LedgerConfig::parse_consensus_type` saw a string it doesn't recognize.
    #[error("unknown consensus type: {0}")]
    UnknownConsensusType(String),
}

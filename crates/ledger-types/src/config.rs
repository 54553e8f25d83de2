//! # Ledger Configuration
//!
//! Replaces the Go original's package-level `config.DefConfig` singleton
//! with an explicit struct passed into `Ledger::open`. See Design Notes in
//! SPEC_FULL.md section B.4.

use crate::errors::LedgerTypesError;

/// Which consensus family this ledger instance is running under.
///
/// Only `Vbft` changes behavior here (rolling bookkeeper set, quorum-based
/// header verification); everything else verifies against the genesis
/// `NextBookkeeper` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusType {
    /// Rolling BFT bookkeeper set, config blocks may rotate peers.
    Vbft,
    /// Any other consensus driver (single fixed `NextBookkeeper` chain).
    Other,
}

impl ConsensusType {
    /// Parse the way the original compares `Genesis.ConsensusType` —
    /// case-insensitively, `"vbft"` activates the VBFT branches.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("vbft") {
            ConsensusType::Vbft
        } else {
            ConsensusType::Other
        }
    }

    /// Strict variant used where an unrecognized string should be an error
    /// instead of silently falling back to `Other`.
    pub fn parse_strict(raw: &str) -> Result<Self, LedgerTypesError> {
        match raw.to_ascii_lowercase().as_str() {
            "vbft" => Ok(ConsensusType::Vbft),
            "solo" | "other" | "" => Ok(ConsensusType::Other),
            other => Err(LedgerTypesError::UnknownConsensusType(other.to_string())),
        }
    }

    /// Whether the VBFT branches (bookkeeper rotation, quorum verification)
    /// are active.
    pub fn is_vbft(&self) -> bool {
        matches!(self, ConsensusType::Vbft)
    }
}

/// Engine-wide configuration, injected explicitly at construction time.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Consensus family in use; gates the VBFT verification/rotation paths.
    pub consensus_type: ConsensusType,
    /// Header-index flush cadence (spec default: 2000).
    pub header_index_batch_size: u64,
}

impl LedgerConfig {
    /// Construct a VBFT-flavored config with the default batch size.
    pub fn vbft() -> Self {
        Self {
            consensus_type: ConsensusType::Vbft,
            header_index_batch_size: crate::entities::HEADER_INDEX_BATCH_SIZE,
        }
    }

    /// Construct a non-VBFT config with the default batch size.
    pub fn non_vbft() -> Self {
        Self {
            consensus_type: ConsensusType::Other,
            header_index_batch_size: crate::entities::HEADER_INDEX_BATCH_SIZE,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::vbft()
    }
}

//! # Header Verification Pipeline
//!
//! Chain-link + timestamp checks common to both consensus modes, then a
//! VBFT bookkeeper/multisig branch or a non-VBFT NextBookkeeper/multisig
//! branch (SPEC-4.2). Called twice per block's journey — once against
//! the header peer-set, once against the block peer-set — each call
//! returning the peer-set the caller should swap in afterwards.
//! Grounded on `qc-09-finality::domain::batch_verifier` for the
//! threshold-check shape and `qc-08-consensus` for the validator-set
//! rotation pattern.

use ledger_crypto::verify_multisig;
use ledger_types::{bft_quorum, address_from_bookkeepers, ChainConfig, ConsensusType, Header};
use tracing::{debug, warn};

use crate::errors::VerifierError;

/// Verify `header` against `prev` and the live `peer_set`.
///
/// Returns `Some(new_peer_set)` when verification produced a fresh peer
/// set to swap in (a VBFT config-boundary block), `None` when the caller
/// should leave its current peer-set copy untouched.
pub fn verify_header(
    prev: Option<&Header>,
    header: &Header,
    peer_set: &ChainConfig,
    consensus_type: ConsensusType,
) -> Result<Option<ChainConfig>, VerifierError> {
    if header.height == 0 {
        debug!("genesis header admitted without verification");
        return Ok(None);
    }

    let prev = prev.ok_or(VerifierError::MissingPrevHeader)?;

    if prev.height + 1 != header.height {
        return Err(VerifierError::HeightMismatch {
            expected_prev: prev.height,
            got: header.height,
        });
    }
    if prev.timestamp >= header.timestamp {
        return Err(VerifierError::TimestampNotIncreasing {
            prev: prev.timestamp,
            got: header.timestamp,
        });
    }

    match consensus_type {
        ConsensusType::Vbft => verify_vbft(header, peer_set),
        ConsensusType::Other => verify_non_vbft(prev, header),
    }
}

fn verify_vbft(header: &Header, peer_set: &ChainConfig) -> Result<Option<ChainConfig>, VerifierError> {
    let n = header.bookkeepers.len();
    if n == 0 {
        return Err(VerifierError::EmptyBookkeeperSet);
    }
    let m = bft_quorum(n);
    if n < m {
        return Err(VerifierError::EmptyBookkeeperSet);
    }

    for pubkey in &header.bookkeepers {
        if !peer_set.contains(pubkey) {
            warn!("header bookkeeper not present in live peer set");
            return Err(VerifierError::UnknownBookkeeper);
        }
    }

    verify_multisig(&header.bookkeepers, &header.sig_data, &header.hash(), m)?;

    let info = header.vbft_block_info()?;
    match info.new_chain_config {
        Some(new_config) => {
            debug!(peers = new_config.len(), "VBFT config-boundary block: rotating peer set");
            Ok(Some(new_config))
        }
        None => Ok(None),
    }
}

fn verify_non_vbft(prev: &Header, header: &Header) -> Result<Option<ChainConfig>, VerifierError> {
    let addr = address_from_bookkeepers(&header.bookkeepers);
    if prev.next_bookkeeper != addr {
        return Err(VerifierError::NextBookkeeperMismatch);
    }

    let n = header.bookkeepers.len();
    let m = bft_quorum(n);
    verify_multisig(&header.bookkeepers, &header.sig_data, &header.hash(), m)?;

    // Non-VBFT has no rotating peer set: the caller's copy is left as-is.
    Ok(None)
}

use thiserror::Error;

use ledger_crypto::CryptoError;
use ledger_types::LedgerTypesError;

/// Why a header failed verification (SPEC-4.2).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifierError {
    #[error("previous header not found for hash")]
    MissingPrevHeader,
    #[error("height {got} does not follow previous height {expected_prev} + 1")]
    HeightMismatch { expected_prev: u64, got: u64 },
    #[error("timestamp {got} does not strictly increase past previous timestamp {prev}")]
    TimestampNotIncreasing { prev: u64, got: u64 },
    #[error("bookkeeper set is empty")]
    EmptyBookkeeperSet,
    #[error("bookkeeper is not a member of the current peer set")]
    UnknownBookkeeper,
    #[error("non-VBFT NextBookkeeper mismatch: previous header did not authorize this signer set")]
    NextBookkeeperMismatch,
    #[error("malformed consensus payload: {0}")]
    MalformedConsensusPayload(#[from] LedgerTypesError),
    #[error("multisig verification failed: {0}")]
    Multisig(#[from] CryptoError),
}

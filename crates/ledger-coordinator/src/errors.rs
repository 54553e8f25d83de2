use thiserror::Error;

use ledger_block_store::BlockStoreError;
use ledger_execution::ExecutionError;
use ledger_header_verifier::VerifierError;
use ledger_state_store::StateStoreError;
use ledger_types::LedgerTypesError;

use ledger_event_store::EventStoreError;

/// Errors surfaced by the `Ledger` coordinator (SPEC-1..6).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("block store error: {0}")]
    Block(#[from] BlockStoreError),
    #[error("state store error: {0}")]
    State(#[from] StateStoreError),
    #[error("event store error: {0}")]
    Event(#[from] EventStoreError),
    #[error("header verification failed: {0}")]
    Verification(#[from] VerifierError),
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
    #[error("type error: {0}")]
    Types(#[from] LedgerTypesError),
    #[error("height {got} does not follow the current tip (expected {expected})")]
    HeightGap { expected: u64, got: u64 },
    #[error("fatal invariant violation: {0}")]
    Fatal(String),
}

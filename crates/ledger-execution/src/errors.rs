use thiserror::Error;

use ledger_types::VmError;

/// Errors surfaced by the execution façade (SPEC-4.5).
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// `overlay.error()` was non-nil: fatal to the whole block.
    #[error("overlay I/O fault is fatal to the block: {0}")]
    OverlayFatal(String),
    #[error("transaction type is not executable via PreExecuteContract")]
    UnsupportedTxType,
    #[error("contract VM error: {0}")]
    Vm(#[from] VmError),
}

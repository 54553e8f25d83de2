//! # Execution Façade Contracts
//!
//! The narrow interface the state-transition engine (`ledger-execution`)
//! and the state store (`ledger-state-store`) share without either
//! depending on the other: a scratch read/write port (`ScratchDb`, which
//! `CacheDB` implements) and the `SmartContractVm` façade SPEC-1 names as
//! an out-of-scope collaborator ("invoked through a `SmartContract`
//! façade"). Only the façade's shape lives here; the VM itself is never
//! implemented in this workspace.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::entities::{Hash, Transaction};

/// A per-transaction scratch read/write port. `CacheDB` (ledger-state-store)
/// is the only implementor; the VM façade is generic over it so this crate
/// never needs to know about overlays or persistent snapshots.
pub trait ScratchDb {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&mut self, key: &[u8], value: Vec<u8>);
    fn delete(&mut self, key: &[u8]);
}

/// Errors the VM façade can raise. A handler-returned error without a
/// concurrent overlay error is non-fatal to the block (SPEC-4.5); only
/// `ScratchDb`-level faults surfaced separately through the overlay are
/// fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("contract code is empty")]
    EmptyCode,
    #[error("contract not deployed at {0:x?}")]
    ContractNotDeployed(Hash),
    #[error("transaction type is not executable")]
    UnsupportedTxType,
    #[error("contract execution failed: {0}")]
    ExecutionFailed(String),
}

/// The `SmartContract` façade (SPEC-1, SPEC-4.5): deploy/invoke against a
/// scratch db, plus the native `global_params` read `get_pre_gas` needs.
pub trait SmartContractVm: Send + Sync {
    /// Install a contract's code. Writes go through `db`.
    fn deploy(&self, db: &mut dyn ScratchDb, tx: &Transaction) -> Result<(), VmError>;

    /// Invoke a deployed contract, returning the notifications it emitted.
    fn invoke(&self, db: &mut dyn ScratchDb, tx: &Transaction) -> Result<Vec<Notification>, VmError>;

    /// Read the `global_params` native contract (SPEC-4.5 `getPreGas`):
    /// looks up each name in `names`, omitting any that are absent or
    /// empty.
    fn get_global_param(
        &self,
        db: &dyn ScratchDb,
        names: &[String],
    ) -> Result<HashMap<String, u64>, VmError>;
}

/// Outcome state of a transaction's execution (SPEC-4.5 "notify").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyState {
    Fail,
    Success,
}

/// A single contract-emitted event (SPEC glossary "Execute-Notify").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub contract: Hash,
    pub payload: Vec<u8>,
}

/// The structured record of one transaction's execution outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteNotify {
    pub tx_hash: Hash,
    pub state: NotifyState,
    pub gas_consumed: u64,
    pub notifications: Vec<Notification>,
}

impl ExecuteNotify {
    /// `notify = {TxHash, State: FAIL}` (SPEC-4.5 `handleTransaction`).
    pub fn failed(tx_hash: Hash) -> Self {
        Self {
            tx_hash,
            state: NotifyState::Fail,
            gas_consumed: 0,
            notifications: Vec::new(),
        }
    }

    pub fn succeeded(tx_hash: Hash, gas_consumed: u64, notifications: Vec<Notification>) -> Self {
        Self {
            tx_hash,
            state: NotifyState::Success,
            gas_consumed,
            notifications,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.state, NotifyState::Success)
    }
}

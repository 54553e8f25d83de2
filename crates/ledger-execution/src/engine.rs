//! # Execution Engine
//!
//! The `SmartContract` façade from the caller's side: per-tx dispatch
//! during block save (`handle_transaction`, SPEC-4.5) and no-commit
//! simulation for RPC-style previews (`pre_execute_contract`,
//! `get_pre_gas`, `refresh_global_param`). Wraps a `SmartContractVm`
//! trait object; the VM itself is never implemented here (SPEC-1
//! Out of scope). Grounded on `qc-02-block-storage::service` for the
//! "façade holds a cached derived value, refreshed at block save" shape.

use std::sync::RwLock;

use ledger_block_store::kv::KeyValueStore;
use ledger_state_store::{CacheDB, Overlay};
use ledger_types::{ExecuteNotify, Notification, NotifyState, ScratchDb, SmartContractVm, Transaction, TxType};
use tracing::warn;

use crate::errors::ExecutionError;
use crate::gas::{calc_gas_by_code_len, GasTable, GLOBAL_PARAM_NAMES, MIN_TRANSACTION_GAS};

/// Result of a no-commit contract simulation (SPEC-4.5 `PreExecuteContract`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreExecuteResult {
    pub state: NotifyState,
    pub gas_consumed: u64,
    pub notifications: Vec<Notification>,
}

/// Holds the VM façade and the gas table last read from the
/// `global_params` native contract, refreshed once per non-genesis block
/// save (SPEC-4.5 `refreshGlobalParam`). Owns the VM behind a `Box` (rather
/// than borrowing it) so a `Ledger` can own both without a self-referential
/// lifetime.
pub struct ExecutionEngine {
    vm: Box<dyn SmartContractVm>,
    gas_table: RwLock<GasTable>,
}

impl ExecutionEngine {
    pub fn new(vm: Box<dyn SmartContractVm>) -> Self {
        Self {
            vm,
            gas_table: RwLock::new(GasTable::default()),
        }
    }

    /// Read the three named gas parameters off the `global_params` native
    /// contract through `db` (SPEC-4.5 `getPreGas`).
    pub fn get_pre_gas(&self, db: &dyn ScratchDb) -> Result<GasTable, ExecutionError> {
        let names: Vec<String> = GLOBAL_PARAM_NAMES.iter().map(|s| s.to_string()).collect();
        let params = self.vm.get_global_param(db, &names)?;
        Ok(GasTable::from_params(&params))
    }

    /// Refresh the in-process gas table from the current global params
    /// (called once per non-genesis block save, SPEC-4.5).
    pub fn refresh_global_param(&self, db: &dyn ScratchDb) -> Result<(), ExecutionError> {
        let table = self.get_pre_gas(db)?;
        *self.gas_table.write().unwrap() = table;
        Ok(())
    }

    pub fn current_gas_table(&self) -> GasTable {
        *self.gas_table.read().unwrap()
    }

    /// Simulate `tx` without committing any writes (SPEC-4.5
    /// `PreExecuteContract`): fetches its own fresh gas table via
    /// `getPreGas` rather than the one cached at the last block save, since
    /// a preview must reflect whatever global params are live right now.
    /// Deploy cost is synthetic (code length times the deploy factor, plus
    /// the flat contract-create fee); invoke cost is code length times the
    /// invoke factor, floored at `MIN_TRANSACTION_GAS` (our façade has no
    /// per-opcode metering to report a real "remaining gas", unlike the VM
    /// this wraps).
    pub fn pre_execute_contract(
        &self,
        db: &mut dyn ScratchDb,
        tx: &Transaction,
    ) -> Result<PreExecuteResult, ExecutionError> {
        let table = self.get_pre_gas(&*db)?;
        match &tx.payload {
            ledger_types::Payload::Invoke { code } => {
                let notifications = self.vm.invoke(db, tx)?;
                let gas_consumed = calc_gas_by_code_len(code.len(), table.invoke_len_factor)
                    .max(MIN_TRANSACTION_GAS);
                Ok(PreExecuteResult {
                    state: NotifyState::Success,
                    gas_consumed,
                    notifications,
                })
            }
            ledger_types::Payload::Deploy { code } => {
                self.vm.deploy(db, tx)?;
                let gas_consumed =
                    table.contract_create + calc_gas_by_code_len(code.len(), table.deploy_len_factor);
                Ok(PreExecuteResult {
                    state: NotifyState::Success,
                    gas_consumed,
                    notifications: Vec::new(),
                })
            }
            ledger_types::Payload::Other(_) => Err(ExecutionError::UnsupportedTxType),
        }
    }

    /// Dispatch a transaction against the block's scratch layer during
    /// block save (SPEC-4.5 `handleTransaction`). An overlay I/O fault is
    /// fatal to the whole block; a handler error without one is logged
    /// and leaves the notify at `Fail`.
    pub fn handle_transaction<KV: KeyValueStore>(
        &self,
        overlay: &Overlay<'_, KV>,
        cache: &mut CacheDB<'_, '_, KV>,
        tx: &Transaction,
    ) -> Result<ExecuteNotify, ExecutionError> {
        let outcome = match tx.tx_type {
            TxType::Deploy => self.vm.deploy(cache, tx).map(|_| Vec::new()),
            TxType::Invoke => self.vm.invoke(cache, tx),
            TxType::Other(_) => Ok(Vec::new()),
        };

        if let Some(err) = overlay.error() {
            return Err(ExecutionError::OverlayFatal(err));
        }

        let notify = match (tx.tx_type, outcome) {
            (TxType::Other(_), _) => {
                cache.reset();
                ExecuteNotify::failed(tx.hash())
            }
            (_, Ok(notifications)) => {
                cache.commit();
                ExecuteNotify::succeeded(tx.hash(), 0, notifications)
            }
            (_, Err(e)) => {
                warn!(tx_hash = ?tx.hash(), error = %e, "transaction handler failed (non-fatal)");
                cache.reset();
                ExecuteNotify::failed(tx.hash())
            }
        };

        Ok(notify)
    }
}

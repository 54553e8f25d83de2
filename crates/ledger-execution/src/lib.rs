//! # Execution Façade
//!
//! The caller-side wrapper around a `SmartContractVm` (SPEC-4.5):
//! per-tx dispatch during block save, and no-commit simulation for
//! `PreExecuteContract`. The VM itself stays out of scope (SPEC-1); this
//! crate only orchestrates calls into one.

pub mod engine;
pub mod errors;
pub mod gas;
pub mod reference_vm;

pub use engine::{ExecutionEngine, PreExecuteResult};
pub use errors::ExecutionError;
pub use gas::GasTable;
pub use reference_vm::ReferenceVm;

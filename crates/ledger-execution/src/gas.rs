//! # Gas Table
//!
//! The three native `global_params` entries the pre-execution path reads
//! (SPEC-4.5 `getPreGas`): a flat contract-creation fee plus a per-byte
//! factor for invoke and deploy code. Grounded on `qc-02-block-storage`'s
//! sys-fee accounting, generalized to the three named parameters.

use std::collections::HashMap;

pub const CONTRACT_CREATE_NAME: &str = "contractCreateFee";
pub const UINT_INVOKE_CODE_LEN_NAME: &str = "uintInvokeCodeLenFee";
pub const UINT_DEPLOY_CODE_LEN_NAME: &str = "uintDeployCodeLenFee";

/// A transaction always costs at least this much gas, regardless of size.
pub const MIN_TRANSACTION_GAS: u64 = 20_000;

pub const GLOBAL_PARAM_NAMES: [&str; 3] = [
    CONTRACT_CREATE_NAME,
    UINT_INVOKE_CODE_LEN_NAME,
    UINT_DEPLOY_CODE_LEN_NAME,
];

/// The gas parameters `PreExecuteContract` estimates cost from. Missing
/// entries in the native contract's response default to zero (SPEC-4.5:
/// "missing/empty values omitted").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasTable {
    pub contract_create: u64,
    pub invoke_len_factor: u64,
    pub deploy_len_factor: u64,
}

impl GasTable {
    pub fn from_params(params: &HashMap<String, u64>) -> Self {
        Self {
            contract_create: params.get(CONTRACT_CREATE_NAME).copied().unwrap_or(0),
            invoke_len_factor: params.get(UINT_INVOKE_CODE_LEN_NAME).copied().unwrap_or(0),
            deploy_len_factor: params.get(UINT_DEPLOY_CODE_LEN_NAME).copied().unwrap_or(0),
        }
    }
}

impl Default for GasTable {
    fn default() -> Self {
        Self {
            contract_create: 500_000,
            invoke_len_factor: 100,
            deploy_len_factor: 200,
        }
    }
}

/// `code_len * factor`, the shared building block behind both the invoke
/// and deploy cost formulas.
pub fn calc_gas_by_code_len(code_len: usize, factor: u64) -> u64 {
    code_len as u64 * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_nonzero() {
        let table = GasTable::default();
        assert!(table.contract_create > 0);
        assert!(table.invoke_len_factor > 0);
    }

    #[test]
    fn test_from_params_defaults_missing_to_zero() {
        let params = HashMap::from([(CONTRACT_CREATE_NAME.to_string(), 42u64)]);
        let table = GasTable::from_params(&params);
        assert_eq!(table.contract_create, 42);
        assert_eq!(table.invoke_len_factor, 0);
        assert_eq!(table.deploy_len_factor, 0);
    }

    #[test]
    fn test_calc_gas_by_code_len() {
        assert_eq!(calc_gas_by_code_len(10, 5), 50);
        assert_eq!(calc_gas_by_code_len(0, 5), 0);
    }
}

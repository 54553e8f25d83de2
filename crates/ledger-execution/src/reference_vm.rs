//! # Reference VM
//!
//! A minimal `SmartContractVm` used by this workspace's own tests (and
//! usable as a smoke-test VM for a node running without a real contract
//! runtime attached). Deploy stores the code verbatim under the
//! transaction's hash; invoke looks the code up and bumps a per-contract
//! call counter. Not a production contract engine — SPEC-1 explicitly
//! keeps the real VM out of scope.

use std::collections::HashMap;

use ledger_types::{ExecuteNotify, Hash, Notification, NotifyState, ScratchDb, SmartContractVm, Transaction, VmError};

fn code_key(contract: &Hash) -> Vec<u8> {
    let mut key = b"refvm:code:".to_vec();
    key.extend_from_slice(contract);
    key
}

fn counter_key(contract: &Hash) -> Vec<u8> {
    let mut key = b"refvm:calls:".to_vec();
    key.extend_from_slice(contract);
    key
}

/// A deterministic, stateless-besides-storage reference VM.
#[derive(Default)]
pub struct ReferenceVm;

impl ReferenceVm {
    pub fn new() -> Self {
        Self
    }
}

impl SmartContractVm for ReferenceVm {
    fn deploy(&self, db: &mut dyn ScratchDb, tx: &Transaction) -> Result<(), VmError> {
        let code = match &tx.payload {
            ledger_types::Payload::Deploy { code } => code,
            _ => return Err(VmError::UnsupportedTxType),
        };
        if code.is_empty() {
            return Err(VmError::EmptyCode);
        }
        db.put(&code_key(&tx.hash()), code.clone());
        Ok(())
    }

    fn invoke(&self, db: &mut dyn ScratchDb, tx: &Transaction) -> Result<Vec<Notification>, VmError> {
        let contract = tx.hash();
        if db.get(&code_key(&contract)).is_none() {
            return Err(VmError::ContractNotDeployed(contract));
        }
        let calls = db
            .get(&counter_key(&contract))
            .map(|bytes| u64::from_le_bytes(bytes.try_into().unwrap_or_default()))
            .unwrap_or(0)
            + 1;
        db.put(&counter_key(&contract), calls.to_le_bytes().to_vec());

        Ok(vec![Notification {
            contract,
            payload: calls.to_le_bytes().to_vec(),
        }])
    }

    fn get_global_param(
        &self,
        _db: &dyn ScratchDb,
        names: &[String],
    ) -> Result<HashMap<String, u64>, VmError> {
        Ok(names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), 1_000 + i as u64 * 10))
            .collect())
    }
}

/// Build a `Fail` notify directly, for callers that short-circuit before
/// reaching the VM at all (e.g. an unsupported tx type at the coordinator
/// level).
pub fn failed_notify(tx_hash: Hash) -> ExecuteNotify {
    ExecuteNotify {
        tx_hash,
        state: NotifyState::Fail,
        gas_consumed: 0,
        notifications: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_types::{Payload, TxType};

    struct TestDb(HashMap<Vec<u8>, Vec<u8>>);
    impl ScratchDb for TestDb {
        fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
            self.0.get(key).cloned()
        }
        fn put(&mut self, key: &[u8], value: Vec<u8>) {
            self.0.insert(key.to_vec(), value);
        }
        fn delete(&mut self, key: &[u8]) {
            self.0.remove(key);
        }
    }

    #[test]
    fn test_deploy_then_invoke_counts_calls() {
        let vm = ReferenceVm::new();
        let mut db = TestDb(HashMap::new());

        // A deploy and an invoke with the same code bytes and nonce hash
        // identically (Transaction::hash ignores tx_type), so this models
        // "invoke the contract this deploy just created".
        let deploy_tx = Transaction::new(TxType::Deploy, Payload::Deploy { code: vec![1, 2, 3] }, 0);
        vm.deploy(&mut db, &deploy_tx).unwrap();

        let invoke_tx = Transaction::new(TxType::Invoke, Payload::Invoke { code: vec![1, 2, 3] }, 0);
        assert_eq!(invoke_tx.hash(), deploy_tx.hash());

        let notifications = vm.invoke(&mut db, &invoke_tx).unwrap();
        assert_eq!(notifications.len(), 1);

        let again = vm.invoke(&mut db, &invoke_tx).unwrap();
        assert_eq!(again[0].payload, 2u64.to_le_bytes().to_vec());
    }

    #[test]
    fn test_invoke_without_deploy_fails() {
        let vm = ReferenceVm::new();
        let mut db = TestDb(HashMap::new());
        let tx = Transaction::new(TxType::Invoke, Payload::Invoke { code: vec![5] }, 9);
        assert_eq!(
            vm.invoke(&mut db, &tx).unwrap_err(),
            VmError::ContractNotDeployed(tx.hash())
        );
    }

    #[test]
    fn test_deploy_rejects_empty_code() {
        let vm = ReferenceVm::new();
        let mut db = TestDb(HashMap::new());
        let tx = Transaction::new(TxType::Deploy, Payload::Deploy { code: vec![] }, 0);
        assert_eq!(vm.deploy(&mut db, &tx).unwrap_err(), VmError::EmptyCode);
    }

    #[test]
    fn test_invoke_after_deploy_of_same_tx_succeeds() {
        let vm = ReferenceVm::new();
        let mut db = TestDb(HashMap::new());
        let tx = Transaction::new(TxType::Invoke, Payload::Invoke { code: vec![9] }, 0);

        // Seed storage as if this tx's own code had been deployed.
        db.put(&code_key(&tx.hash()), vec![9]);

        let notifications = vm.invoke(&mut db, &tx).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].contract, tx.hash());
    }

    #[test]
    fn test_get_global_param_returns_entry_per_name() {
        let vm = ReferenceVm::new();
        let db = TestDb(HashMap::new());
        let names = vec!["a".to_string(), "b".to_string()];
        let params = vm.get_global_param(&db, &names).unwrap();
        assert_eq!(params.len(), 2);
    }
}

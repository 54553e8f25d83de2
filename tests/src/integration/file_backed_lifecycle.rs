//! Drives a `Ledger<FileBackedKVStore>` the way `ledger-node` would:
//! genesis on a fresh data directory, a few blocks, a clean close, then a
//! fresh open against the same directory to prove recovery leaves the
//! chain exactly where it was (SPEC-6).

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ledger_bus::NullEventPublisher;
    use ledger_coordinator::{Ledger, LedgerDependencies};
    use ledger_crypto::KeyPair;
    use ledger_execution::ReferenceVm;
    use ledger_types::{Block, Header, LedgerConfig, Payload, Transaction, TxType};

    fn keys(n: u8) -> Vec<KeyPair> {
        (0..n).map(|i| KeyPair::from_seed([i + 1; 32])).collect()
    }

    fn sign(header: &mut Header, signers: &[KeyPair]) {
        let hash = header.hash();
        header.bookkeepers = signers.iter().map(|k| k.public_key()).collect();
        header.sig_data = signers.iter().map(|k| k.sign(&hash).to_vec()).collect();
    }

    fn deps() -> LedgerDependencies {
        LedgerDependencies {
            config: LedgerConfig::vbft(),
            publisher: Arc::new(NullEventPublisher),
            vm: Box::new(ReferenceVm::new()),
        }
    }

    #[test]
    fn test_reopen_after_clean_close_resumes_at_the_same_tip() {
        let dir = tempfile::tempdir().unwrap();
        let signers = keys(4);
        let genesis = Block {
            header: Header::genesis([0u8; 32], [0u8; 32], 1),
            transactions: Vec::new(),
        };

        {
            let ledger = Ledger::open(dir.path(), deps()).unwrap();
            ledger
                .init_with_genesis(genesis.clone(), signers.iter().map(|k| k.public_key()).collect())
                .unwrap();

            let deploy = Transaction::new(TxType::Deploy, Payload::Deploy { code: vec![1, 2, 3] }, 0);
            let mut header = Header {
                height: 1,
                prev_block_hash: genesis.hash(),
                timestamp: genesis.header.timestamp + 1,
                transactions_root: ledger.get_block_root_with_new_tx_root(deploy.hash()),
                next_bookkeeper: [0u8; 32],
                bookkeepers: Vec::new(),
                sig_data: Vec::new(),
                consensus_payload: Vec::new(),
            };
            sign(&mut header, &signers[..3]);
            ledger
                .add_block(Block {
                    header,
                    transactions: vec![deploy],
                })
                .unwrap();

            assert_eq!(ledger.get_current_block_height(), 1);
            ledger.close();
        }

        // A fresh process opening the same directory must see height 1
        // without being handed a new genesis.
        let ledger2 = Ledger::open(dir.path(), deps()).unwrap();
        ledger2
            .init_with_genesis(genesis.clone(), signers.iter().map(|k| k.public_key()).collect())
            .unwrap();
        assert_eq!(ledger2.get_current_block_height(), 1);
        // Recovery must also restore the header tip (SPEC-3:
        // currentHeaderHeight >= currentBlockHeight), not just the block
        // tip, or the next add_header after reopen sees a stale height-0
        // baseline and rejects a legitimate successor height.
        assert_eq!(ledger2.get_current_header_height(), 1);
        ledger2.close();
    }

    #[test]
    fn test_second_open_against_a_held_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path(), deps()).unwrap();

        let err = Ledger::open(dir.path(), deps()).unwrap_err();
        assert!(err.to_string().contains("block store error") || err.to_string().contains("state store error"));

        ledger.close();
        // Once the first handle is closed, a new open must succeed again.
        let ledger2 = Ledger::open(dir.path(), deps()).unwrap();
        ledger2.close();
    }
}

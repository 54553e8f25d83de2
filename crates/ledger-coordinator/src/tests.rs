//! End-to-end coordinator scenarios over an in-memory ledger: genesis
//! bring-up, header-first sync, full block append, crash recovery, and the
//! read path (SPEC-6 scenarios S1-S6).

use std::sync::Arc;

use ledger_crypto::KeyPair;
use ledger_types::{
    Block, BookkeeperState, Header, LedgerConfig, Payload, PublicKey, Transaction, TxType, VbftBlockInfo,
};

use crate::errors::LedgerError;
use crate::ledger::{Ledger, LedgerDependencies};

fn keys(n: u8) -> Vec<KeyPair> {
    (0..n).map(|i| KeyPair::from_seed([i + 1; 32])).collect()
}

fn pubkeys(signers: &[KeyPair]) -> Vec<PublicKey> {
    signers.iter().map(|k| k.public_key()).collect()
}

fn sign(header: &mut Header, signers: &[KeyPair]) {
    let hash = header.hash();
    header.bookkeepers = signers.iter().map(|k| k.public_key()).collect();
    header.sig_data = signers.iter().map(|k| k.sign(&hash).to_vec()).collect();
}

fn open_vbft(signers: &[KeyPair]) -> (Ledger<ledger_block_store::InMemoryKVStore>, Block) {
    let deps = LedgerDependencies {
        config: LedgerConfig::vbft(),
        publisher: Arc::new(ledger_bus::NullEventPublisher),
        vm: Box::new(ledger_execution::ReferenceVm::new()),
    };
    let ledger = Ledger::open_in_memory(deps);

    let genesis = Block {
        header: Header::genesis([0u8; 32], [0u8; 32], 1),
        transactions: Vec::new(),
    };
    ledger
        .init_with_genesis(genesis.clone(), pubkeys(signers))
        .unwrap();
    (ledger, genesis)
}

fn child_header(prev: &Header, signers: &[KeyPair], tx_root: [u8; 32]) -> Header {
    let mut header = Header {
        height: prev.height + 1,
        prev_block_hash: prev.hash(),
        timestamp: prev.timestamp + 1,
        transactions_root: tx_root,
        next_bookkeeper: [0u8; 32],
        bookkeepers: Vec::new(),
        sig_data: Vec::new(),
        consensus_payload: Vec::new(),
    };
    sign(&mut header, signers);
    header
}

#[test]
fn test_genesis_bring_up_seeds_bookkeeper_state_and_tip() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);

    assert_eq!(ledger.get_current_block_height(), 0);
    assert_eq!(ledger.get_current_block_hash(), genesis.hash());

    let state = ledger.get_bookkeeper_state().unwrap().unwrap();
    let mut expected = pubkeys(&signers);
    expected.sort_unstable();
    assert_eq!(state.curr_bookkeeper, expected);
    assert_eq!(state.next_bookkeeper, expected);
}

#[test]
fn test_genesis_is_idempotent_and_runs_recovery_on_reopen() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);
    ledger.close();

    // Re-running InitWithGenesis against an already-initialized ledger
    // must verify, not reinstall, and take the recovery branch.
    let deps = LedgerDependencies {
        config: LedgerConfig::vbft(),
        publisher: Arc::new(ledger_bus::NullEventPublisher),
        vm: Box::new(ledger_execution::ReferenceVm::new()),
    };
    // A fresh in-memory ledger has no persisted data to reopen against, so
    // this models the "version marker absent" path being taken exactly
    // once; the genuinely interesting case is file-backed, covered by the
    // block/state/event store crates' own lock/reopen tests.
    let ledger2 = Ledger::open_in_memory(deps);
    ledger2
        .init_with_genesis(genesis.clone(), pubkeys(&signers))
        .unwrap();
    assert_eq!(ledger2.get_current_block_hash(), genesis.hash());
}

#[test]
fn test_add_header_then_add_block_advances_both_tips() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);

    let header = child_header(&genesis.header, &signers[..3], [7u8; 32]);
    ledger.add_header(header.clone()).unwrap();
    assert_eq!(ledger.get_current_header_height(), 1);
    assert_eq!(ledger.get_current_header_hash(), header.hash());
    // The block tip has not moved yet: header-first sync runs ahead of
    // execution (SPEC-2).
    assert_eq!(ledger.get_current_block_height(), 0);

    let block = Block {
        header,
        transactions: Vec::new(),
    };
    ledger.add_block(block.clone()).unwrap();
    assert_eq!(ledger.get_current_block_height(), 1);
    assert_eq!(ledger.get_current_block_hash(), block.hash());
}

#[test]
fn test_add_header_admits_consecutive_headers_with_no_block_in_between() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);

    // Headers may run arbitrarily far ahead of blocks (SPEC-2); two
    // back-to-back add_header calls with no intervening add_block must
    // both succeed.
    let h1 = child_header(&genesis.header, &signers[..3], [1u8; 32]);
    ledger.add_header(h1.clone()).unwrap();
    assert_eq!(ledger.get_current_header_height(), 1);

    let h2 = child_header(&h1, &signers[..3], [2u8; 32]);
    ledger.add_header(h2.clone()).unwrap();
    assert_eq!(ledger.get_current_header_height(), 2);
    assert_eq!(ledger.get_current_header_hash(), h2.hash());
    assert_eq!(ledger.get_current_block_height(), 0);
}

#[test]
fn test_add_block_out_of_order_is_height_gap_error() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);

    let h1 = child_header(&genesis.header, &signers[..3], [1u8; 32]);
    let h2 = child_header(&h1, &signers[..3], [2u8; 32]);
    let skip_ahead = Block {
        header: h2,
        transactions: Vec::new(),
    };

    let err = ledger.add_block(skip_ahead).unwrap_err();
    assert!(matches!(err, LedgerError::HeightGap { expected: 1, got: 2 }));
    assert_eq!(ledger.get_current_block_height(), 0);
}

#[test]
fn test_add_block_duplicate_delivery_is_noop() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);

    let header = child_header(&genesis.header, &signers[..3], [3u8; 32]);
    let block = Block {
        header,
        transactions: Vec::new(),
    };
    ledger.add_block(block.clone()).unwrap();
    // Redelivering the same block (or the genesis block again) must be
    // silently accepted, not an error.
    ledger.add_block(block).unwrap();
    assert_eq!(ledger.get_current_block_height(), 1);
}

#[test]
fn test_add_block_executes_transactions_and_records_notify() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);

    let deploy = Transaction::new(TxType::Deploy, Payload::Deploy { code: vec![9, 9, 9] }, 0);
    let header = child_header(&genesis.header, &signers[..3], ledger.get_block_root_with_new_tx_root(deploy.hash()));
    let block = Block {
        header,
        transactions: vec![deploy.clone()],
    };
    ledger.add_block(block).unwrap();

    let notify = ledger.get_event_notify_by_tx(&deploy.hash()).unwrap().unwrap();
    assert!(notify.is_success());
    assert_eq!(ledger.get_event_notify_by_block(1).unwrap(), vec![deploy.hash()]);

    let (fetched_tx, height) = ledger.get_transaction(&deploy.hash()).unwrap().unwrap();
    assert_eq!(fetched_tx.hash(), deploy.hash());
    assert_eq!(height, 1);
}

#[test]
fn test_vbft_config_boundary_block_rotates_block_peer_set() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);

    let next_signers = keys(3);
    let new_config_peers: Vec<PublicKey> = pubkeys(&next_signers);
    let new_config = ledger_types::ChainConfig::new(
        new_config_peers
            .iter()
            .enumerate()
            .map(|(i, pk)| ledger_types::PeerInfo { pubkey: *pk, index: i as u32 })
            .collect(),
    );
    let payload = VbftBlockInfo {
        new_chain_config: Some(new_config),
        last_config_block_num: Some(1),
    }
    .encode();

    let mut header = Header {
        height: 1,
        prev_block_hash: genesis.hash(),
        timestamp: genesis.header.timestamp + 1,
        transactions_root: [0u8; 32],
        next_bookkeeper: [0u8; 32],
        bookkeepers: Vec::new(),
        sig_data: Vec::new(),
        consensus_payload: payload,
    };
    sign(&mut header, &signers[..3]);

    let block = Block {
        header: header.clone(),
        transactions: Vec::new(),
    };
    ledger.add_block(block).unwrap();

    // A block signed only by the *new* committee now succeeds, proving the
    // block-side peer-set copy rotated.
    let h2 = child_header(&header, &next_signers[..2], [1u8; 32]);
    let block2 = Block {
        header: h2,
        transactions: Vec::new(),
    };
    ledger.add_block(block2).unwrap();
    assert_eq!(ledger.get_current_block_height(), 2);
}

#[test]
fn test_recovery_replays_state_and_events_behind_block_tip() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);

    let deploy = Transaction::new(TxType::Deploy, Payload::Deploy { code: vec![4, 4] }, 1);
    let header = child_header(&genesis.header, &signers[..3], ledger.get_block_root_with_new_tx_root(deploy.hash()));
    let block = Block {
        header,
        transactions: vec![deploy.clone()],
    };
    ledger.add_block(block).unwrap();

    // Simulate a crash that lost the state/event writes for height 1 but
    // kept the block: drop down to ledger internals and replay directly.
    ledger.event_store.clear_all().unwrap();
    ledger.state_store.clear_all().unwrap();
    let mut genesis_batch = ledger.state_store.new_batch();
    ledger
        .state_store
        .save_bookkeeper_state(&BookkeeperState::genesis(pubkeys(&signers)), &mut genesis_batch)
        .unwrap();
    ledger.state_store.commit_to(genesis_batch).unwrap();

    ledger.recover().unwrap();

    assert_eq!(ledger.get_current_block_height(), 1);
    let notify = ledger.get_event_notify_by_tx(&deploy.hash()).unwrap();
    assert!(notify.is_some());
}

#[test]
fn test_pre_execute_contract_does_not_persist_writes() {
    let signers = keys(4);
    let (ledger, _genesis) = open_vbft(&signers);

    let tx = Transaction::new(TxType::Deploy, Payload::Deploy { code: vec![1, 2] }, 5);
    let result = ledger.pre_execute_contract(&tx).unwrap();
    assert_eq!(result.state, ledger_types::NotifyState::Success);
    assert!(result.gas_consumed > 0);

    assert!(ledger.get_contract_state(&tx.hash()).unwrap().is_none());
}

#[test]
fn test_add_headers_partial_batch_keeps_prefix_on_failure() {
    let signers = keys(4);
    let (ledger, genesis) = open_vbft(&signers);

    let h1 = child_header(&genesis.header, &signers[..3], [1u8; 32]);
    let mut h2_bad = child_header(&h1, &signers[..3], [2u8; 32]);
    // Corrupt h2's signatures after signing so verification fails.
    h2_bad.sig_data[0][0] ^= 0xFF;

    let err = ledger.add_headers(vec![h1.clone(), h2_bad]).unwrap_err();
    assert!(
        matches!(err, LedgerError::Verification(_)),
        "h2 must fail on its corrupted signature, not a height-gap: {err:?}"
    );
    // h1 was accepted before the failing header.
    assert_eq!(ledger.get_current_header_height(), 1);
    assert_eq!(ledger.get_current_header_hash(), h1.hash());
}

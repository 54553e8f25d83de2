//! # Core Domain Entities
//!
//! Block/header/transaction shapes plus the rolling bookkeeper (validator)
//! set, mirroring the "Chain" and "Consensus & Finality" clusters of
//! `shared-types::entities`, generalized to the VBFT ledger this crate
//! describes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::LedgerTypesError;

/// A 256-bit hash (SHA-256 in this implementation).
pub type Hash = [u8; 32];

/// An Ed25519 public key, 32 bytes.
pub type PublicKey = [u8; 32];

/// An Ed25519 signature, 64 bytes.
pub type Signature = [u8; 64];

/// Flush cadence for the durable header-index prefix (SPEC-4.4).
pub const HEADER_INDEX_BATCH_SIZE: u64 = 2000;

/// The reserved byte marking that genesis has been installed (SPEC-6).
pub const SYSTEM_VERSION: u8 = 0x01;

/// The zero hash, used as a sentinel ("no parent", "not yet indexed").
pub const ZERO_HASH: Hash = [0u8; 32];

fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// A VBFT chain-config entry: a bookkeeper's public key and its peer index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub pubkey: PublicKey,
    pub index: u32,
}

/// The set of bookkeepers (validators) authorized to sign at a given
/// config epoch, keyed by public key for O(1) membership checks.
///
/// Two independent copies of this are held by the ledger coordinator:
/// one tracking header verification (which may run ahead of execution)
/// and one tracking block verification (SPEC-3, "Two *separate* in-memory
/// copies").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub peers: Vec<PeerInfo>,
}

impl ChainConfig {
    pub fn new(peers: Vec<PeerInfo>) -> Self {
        Self { peers }
    }

    /// Whether `pubkey` is a member of this config.
    pub fn contains(&self, pubkey: &PublicKey) -> bool {
        self.peers.iter().any(|p| &p.pubkey == pubkey)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Parsed contents of a VBFT header's opaque consensus payload.
///
/// `new_chain_config` is `Some` only on a config-boundary block; header
/// verification swaps the live peer-set copy for `new_chain_config.peers`
/// when present (SPEC-4.2).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VbftBlockInfo {
    pub new_chain_config: Option<ChainConfig>,
    pub last_config_block_num: Option<u64>,
}

impl VbftBlockInfo {
    /// Decode from a header's `consensus_payload`. An empty payload decodes
    /// to the default (no config change).
    pub fn decode(payload: &[u8]) -> Result<Self, LedgerTypesError> {
        if payload.is_empty() {
            return Ok(Self::default());
        }
        bincode::deserialize(payload)
            .map_err(|e| LedgerTypesError::MalformedConsensusPayload(e.to_string()))
    }

    /// Encode for embedding into a header's `consensus_payload`.
    pub fn encode(&self) -> Vec<u8> {
        if self.new_chain_config.is_none() && self.last_config_block_num.is_none() {
            return Vec::new();
        }
        bincode::serialize(self).expect("VbftBlockInfo serialization is infallible")
    }
}

/// The current and next sorted bookkeeper key lists (SPEC-3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookkeeperState {
    pub curr_bookkeeper: Vec<PublicKey>,
    pub next_bookkeeper: Vec<PublicKey>,
}

impl BookkeeperState {
    /// Seed genesis state: both lists start out identical and sorted.
    pub fn genesis(mut bookkeepers: Vec<PublicKey>) -> Self {
        bookkeepers.sort_unstable();
        Self {
            curr_bookkeeper: bookkeepers.clone(),
            next_bookkeeper: bookkeepers,
        }
    }
}

/// A block header. Essential fields per SPEC-3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub height: u64,
    pub prev_block_hash: Hash,
    pub timestamp: u64,
    pub transactions_root: Hash,
    /// Non-VBFT: the multisig "address" the next block must be signed by.
    pub next_bookkeeper: Hash,
    /// Public keys that signed this header.
    pub bookkeepers: Vec<PublicKey>,
    /// One multisig share per signer, same order as `bookkeepers`.
    pub sig_data: Vec<Vec<u8>>,
    /// Opaque consensus payload (VBFT carries a `VbftBlockInfo` in here).
    pub consensus_payload: Vec<u8>,
}

impl Header {
    /// Genesis header: height 0, no parent, no signatures required.
    pub fn genesis(transactions_root: Hash, next_bookkeeper: Hash, timestamp: u64) -> Self {
        Self {
            height: 0,
            prev_block_hash: ZERO_HASH,
            timestamp,
            transactions_root,
            next_bookkeeper,
            bookkeepers: Vec::new(),
            sig_data: Vec::new(),
            consensus_payload: Vec::new(),
        }
    }

    /// The header's hash: computed over the signature-independent fields so
    /// that a signature is a signature *of* this hash, not of itself.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.prev_block_hash);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.transactions_root);
        hasher.update(self.next_bookkeeper);
        hasher.update(self.consensus_payload.as_slice());
        hasher.finalize().into()
    }

    /// Parse the VBFT block info embedded in this header's consensus
    /// payload.
    pub fn vbft_block_info(&self) -> Result<VbftBlockInfo, LedgerTypesError> {
        VbftBlockInfo::decode(&self.consensus_payload)
    }
}

/// Transaction kind. Anything other than Deploy/Invoke is passed through
/// without state effect (SPEC-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    Deploy,
    Invoke,
    Other(u8),
}

/// Transaction payload; shape mirrors `TxType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Deploy { code: Vec<u8> },
    Invoke { code: Vec<u8> },
    Other(Vec<u8>),
}

/// A transaction. `hash` is computed once at construction and carried with
/// the value, rather than recomputed on every access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_type: TxType,
    pub payload: Payload,
    pub nonce: u64,
    hash: Hash,
}

impl Transaction {
    pub fn new(tx_type: TxType, payload: Payload, nonce: u64) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(&nonce.to_le_bytes());
        match &payload {
            Payload::Deploy { code } | Payload::Invoke { code } => buf.extend_from_slice(code),
            Payload::Other(data) => buf.extend_from_slice(data),
        }
        let hash = sha256(&buf);
        Self {
            tx_type,
            payload,
            nonce,
            hash,
        }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }
}

/// A block: header plus its ordered transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }
}

/// BFT quorum for `n` bookkeepers: `m = n - (n-1)/3` (SPEC glossary).
pub fn bft_quorum(n: usize) -> usize {
    n - (n.saturating_sub(1)) / 3
}

/// Derive the non-VBFT "address" a header's `NextBookkeeper` field commits
/// to from a (stably ordered) bookkeeper list: the quorum threshold plus
/// the sorted key set, hashed. Two headers with the same threshold and key
/// set always derive the same address regardless of signer order.
pub fn address_from_bookkeepers(bookkeepers: &[PublicKey]) -> Hash {
    let mut sorted = bookkeepers.to_vec();
    sorted.sort_unstable();
    let m = bft_quorum(sorted.len());
    let mut hasher = Sha256::new();
    hasher.update((m as u64).to_le_bytes());
    for key in &sorted {
        hasher.update(key);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(byte: u8) -> PublicKey {
        [byte; 32]
    }

    #[test]
    fn test_bft_quorum() {
        assert_eq!(bft_quorum(7), 5);
        assert_eq!(bft_quorum(4), 3);
        assert_eq!(bft_quorum(1), 1);
        assert_eq!(bft_quorum(0), 0);
    }

    #[test]
    fn test_address_from_bookkeepers_is_order_independent() {
        let a = address_from_bookkeepers(&[pk(1), pk(2), pk(3)]);
        let b = address_from_bookkeepers(&[pk(3), pk(1), pk(2)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_address_changes_with_membership() {
        let a = address_from_bookkeepers(&[pk(1), pk(2), pk(3)]);
        let b = address_from_bookkeepers(&[pk(1), pk(2), pk(4)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_header_hash_stable_and_sig_independent() {
        let mut h1 = Header::genesis(pk(9), address_from_bookkeepers(&[pk(1)]), 100);
        let h2 = h1.clone();
        assert_eq!(h1.hash(), h2.hash());

        // Mutating sig_data must not change the hash (signatures are *of*
        // the hash, they cannot feed back into it).
        h1.sig_data.push(vec![1, 2, 3]);
        h1.bookkeepers.push(pk(1));
        assert_eq!(h1.hash(), h2.hash());
    }

    #[test]
    fn test_vbft_block_info_roundtrip() {
        let info = VbftBlockInfo {
            new_chain_config: Some(ChainConfig::new(vec![PeerInfo {
                pubkey: pk(1),
                index: 0,
            }])),
            last_config_block_num: Some(10),
        };
        let encoded = info.encode();
        let decoded = VbftBlockInfo::decode(&encoded).unwrap();
        assert_eq!(info, decoded);
    }

    #[test]
    fn test_vbft_block_info_empty_payload_is_default() {
        let decoded = VbftBlockInfo::decode(&[]).unwrap();
        assert_eq!(decoded, VbftBlockInfo::default());
    }

    #[test]
    fn test_bookkeeper_state_genesis_sorts() {
        let state = BookkeeperState::genesis(vec![pk(3), pk(1), pk(2)]);
        assert_eq!(state.curr_bookkeeper, vec![pk(1), pk(2), pk(3)]);
        assert_eq!(state.curr_bookkeeper, state.next_bookkeeper);
    }

    #[test]
    fn test_transaction_hash_depends_on_payload() {
        let t1 = Transaction::new(TxType::Invoke, Payload::Invoke { code: vec![1] }, 0);
        let t2 = Transaction::new(TxType::Invoke, Payload::Invoke { code: vec![2] }, 0);
        assert_ne!(t1.hash(), t2.hash());
    }
}

//! # Tx-Root Merkle Tree
//!
//! The append-only tree of per-block transaction roots that produces a
//! block root at every height (SPEC-3 "Overlay/CacheDB", SPEC-4.1
//! "append `TransactionsRoot` to the Merkle tree", SPEC-6
//! `states/merkle_tree.db`). Grounded on
//! `qc-02-block-storage::domain::mmr::MmrStore`'s shape (peaks/leaves,
//! append-only accumulator for block proofs), but rebuilt as a standard
//! binary Merkle tree with duplicate-last-node padding: the teacher's MMR
//! only bags its *current* peaks and cannot answer "prove leaf i against
//! the root as of height r" for an older `r`, which `GetMerkleProof(proofHeight,
//! rootHeight)` requires.

use ledger_types::{Hash, ZERO_HASH};
use sha2::{Digest, Sha256};

use crate::errors::StateStoreError;

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Inclusion proof for leaf `leaf_index` against the root as of
/// `root_height` leaves. `siblings[i] = (hash, sibling_is_right)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf_index: u64,
    pub root_height: u64,
    pub siblings: Vec<(Hash, bool)>,
}

impl MerkleProof {
    /// Recompute the root a `leaf` and this proof imply.
    pub fn reconstruct_root(&self, leaf: Hash) -> Hash {
        let mut acc = leaf;
        for (sibling, sibling_is_right) in &self.siblings {
            acc = if *sibling_is_right {
                hash_pair(&acc, sibling)
            } else {
                hash_pair(sibling, &acc)
            };
        }
        acc
    }

    /// Whether `leaf` is included under `root` per this proof.
    pub fn verify(&self, leaf: Hash, root: Hash) -> bool {
        self.reconstruct_root(leaf) == root
    }
}

fn combine_level(level: &[Hash]) -> Vec<Hash> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    let mut i = 0;
    while i < level.len() {
        let left = level[i];
        let right = if i + 1 < level.len() { level[i + 1] } else { level[i] };
        next.push(hash_pair(&left, &right));
        i += 2;
    }
    next
}

/// The full leaf history, in block-height order (leaf index == block
/// height, since genesis also contributes a tx root).
#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    leaves: Vec<Hash>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_leaves(leaves: Vec<Hash>) -> Self {
        Self { leaves }
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.leaves
    }

    pub fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Append a new leaf, returning its index (== height it was appended at).
    pub fn append(&mut self, leaf: Hash) -> u64 {
        self.leaves.push(leaf);
        self.leaves.len() as u64 - 1
    }

    /// The root committing to the first `count` leaves.
    pub fn root_at(&self, count: u64) -> Result<Hash, StateStoreError> {
        if count == 0 {
            return Ok(ZERO_HASH);
        }
        if count > self.leaves.len() as u64 {
            return Err(StateStoreError::RootNotFound(count));
        }
        Ok(Self::compute_root(&self.leaves[..count as usize]))
    }

    /// Preview the root that would result from appending `leaf` without
    /// mutating the tree (SPEC-4.1 `GetBlockRootWithNewTxRoot`).
    pub fn root_with_new_leaf(&self, leaf: Hash) -> Hash {
        let mut extended = self.leaves.clone();
        extended.push(leaf);
        Self::compute_root(&extended)
    }

    fn compute_root(leaves: &[Hash]) -> Hash {
        if leaves.is_empty() {
            return ZERO_HASH;
        }
        let mut level = leaves.to_vec();
        while level.len() > 1 {
            level = combine_level(&level);
        }
        level[0]
    }

    /// Build an inclusion proof for `leaf_index` against the root as of
    /// `root_height` leaves (SPEC-4.1 `GetMerkleProof(proofHeight,
    /// rootHeight)`).
    pub fn proof(&self, leaf_index: u64, root_height: u64) -> Result<MerkleProof, StateStoreError> {
        if root_height == 0 || root_height > self.leaves.len() as u64 {
            return Err(StateStoreError::RootNotFound(root_height));
        }
        if leaf_index >= root_height {
            return Err(StateStoreError::ProofHeightOutOfRange {
                proof_height: leaf_index,
                root_height,
            });
        }

        let mut level = self.leaves[..root_height as usize].to_vec();
        let mut idx = leaf_index as usize;
        let mut siblings = Vec::new();

        while level.len() > 1 {
            let sibling_is_right = idx % 2 == 0;
            let sibling_idx = if sibling_is_right { idx + 1 } else { idx - 1 };
            let sibling_hash = if sibling_idx < level.len() {
                level[sibling_idx]
            } else {
                level[idx]
            };
            siblings.push((sibling_hash, sibling_is_right));

            level = combine_level(&level);
            idx /= 2;
        }

        Ok(MerkleProof {
            leaf_index,
            root_height,
            siblings,
        })
    }
}

//! Merkle trees over hex-digest leaves.
//!
//! The tree pair-hashes bottom-up: a parent is the SHA3-256 of the left
//! child's hex text concatenated with the right child's hex text. When a
//! layer has odd width the last node is paired with itself. An empty leaf
//! set roots at `sha3_hex("")`; a single leaf is its own root.
//!
//! Proofs are ordered sibling lists with a side marker per step, so a
//! verifier can recompute the path from any leaf to the root without the
//! rest of the tree.

use serde::{Deserialize, Serialize};

use crate::hash::sha3_hex;

/// Which side of the pair the sibling hash sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One step of a Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// The sibling's hex digest.
    pub hash: String,
    /// Side the sibling occupies relative to the running hash.
    pub position: Side,
}

/// A fully materialized Merkle tree.
///
/// Leaves are hex digests supplied by the caller (entry hashes, ballot
/// hashes); the tree never hashes leaf *content* itself.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `levels[0]` is the leaf layer; the last level holds the root alone.
    levels: Vec<Vec<String>>,
    leaf_count: usize,
}

impl MerkleTree {
    /// Build a tree over the given leaf digests.
    pub fn new(leaves: Vec<String>) -> Self {
        if leaves.is_empty() {
            return MerkleTree {
                levels: vec![vec![sha3_hex(b"")]],
                leaf_count: 0,
            };
        }

        let leaf_count = leaves.len();
        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                next.push(hash_pair(left, right));
            }
            levels.push(next);
        }
        MerkleTree { levels, leaf_count }
    }

    /// The root digest.
    pub fn root(&self) -> &str {
        // Construction always leaves a single node on the top level.
        &self.levels[self.levels.len() - 1][0]
    }

    /// Number of leaves the tree was built over (0 for the empty tree).
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Inclusion proof for the leaf at `index`, or `None` if out of range.
    pub fn proof(&self, index: usize) -> Option<Vec<ProofStep>> {
        if index >= self.leaf_count() {
            return None;
        }
        let mut steps = Vec::new();
        let mut i = index;
        for level in &self.levels[..self.levels.len() - 1] {
            if i % 2 == 0 {
                // Odd tail pairs with itself.
                let sibling = level.get(i + 1).unwrap_or(&level[i]);
                steps.push(ProofStep {
                    hash: sibling.clone(),
                    position: Side::Right,
                });
            } else {
                steps.push(ProofStep {
                    hash: level[i - 1].clone(),
                    position: Side::Left,
                });
            }
            i /= 2;
        }
        Some(steps)
    }

    /// Recompute the path from `leaf_hash` through `proof` and compare with
    /// `root`.
    pub fn verify_proof(leaf_hash: &str, proof: &[ProofStep], root: &str) -> bool {
        let mut acc = leaf_hash.to_string();
        for step in proof {
            acc = match step.position {
                Side::Right => hash_pair(&acc, &step.hash),
                Side::Left => hash_pair(&step.hash, &acc),
            };
        }
        acc == root
    }
}

fn hash_pair(left: &str, right: &str) -> String {
    let mut joined = String::with_capacity(left.len() + right.len());
    joined.push_str(left);
    joined.push_str(right);
    sha3_hex(joined.as_bytes())
}

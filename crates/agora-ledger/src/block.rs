//! Blocks: ordered entry groups with a hash pointer and a Merkle summary.

use serde::{Deserialize, Serialize};
use serde_json::json;

use agora_crypto::{hash_value, MerkleTree};

use crate::entry::LedgerEntry;

/// `previousHash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// An ordered group of entries sealed under proof-of-work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Monotone position in the chain, genesis at 0.
    pub index: u64,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    /// Entries in insertion order.
    pub entries: Vec<LedgerEntry>,
    /// Hash of the previous block, `"0"` for genesis.
    pub previous_hash: String,
    /// Root of the SHA3-256 Merkle tree over entry hashes.
    pub merkle_root: String,
    /// Proof-of-work counter.
    pub nonce: u64,
    /// SHA3-256 over `{index, merkleRoot, nonce, previousHash, timestamp}`.
    pub hash: String,
}

impl Block {
    /// Seal `entries` into a block at `index`, mining until the header hash
    /// carries `difficulty` leading zero hex digits.
    pub fn mine(
        index: u64,
        timestamp_ms: u64,
        entries: Vec<LedgerEntry>,
        previous_hash: String,
        difficulty: usize,
    ) -> Block {
        let merkle_root = merkle_root_of(&entries);
        let mut nonce = 0u64;
        let hash = loop {
            let candidate = header_hash(index, timestamp_ms, &merkle_root, &previous_hash, nonce);
            if meets_difficulty(&candidate, difficulty) {
                break candidate;
            }
            nonce += 1;
        };
        Block {
            index,
            timestamp_ms,
            entries,
            previous_hash,
            merkle_root,
            nonce,
            hash,
        }
    }

    /// Recompute the header hash from the stored fields.
    pub fn header_hash(&self) -> String {
        header_hash(
            self.index,
            self.timestamp_ms,
            &self.merkle_root,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Recompute the Merkle root over the stored entries' hashes.
    pub fn recompute_merkle_root(&self) -> String {
        merkle_root_of(&self.entries)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

/// Root of the Merkle tree over the entries' stored hashes.
pub fn merkle_root_of(entries: &[LedgerEntry]) -> String {
    let leaves: Vec<String> = entries.iter().map(|e| e.hash.clone()).collect();
    MerkleTree::new(leaves).root().to_string()
}

/// Whether a hex digest starts with `difficulty` zero digits.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.as_bytes()[..difficulty].iter().all(|b| *b == b'0')
}

fn header_hash(
    index: u64,
    timestamp_ms: u64,
    merkle_root: &str,
    previous_hash: &str,
    nonce: u64,
) -> String {
    hash_value(&json!({
        "index": index,
        "merkleRoot": merkle_root,
        "nonce": nonce,
        "previousHash": previous_hash,
        "timestamp": timestamp_ms,
    }))
}

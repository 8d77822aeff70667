//! The chain itself: pending queue, sealing, indexes, verification, and
//! inclusion proofs.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use agora_crypto::{MerkleTree, ProofStep};

use crate::block::{self, Block, GENESIS_PREVIOUS_HASH};
use crate::entry::{EntryKind, LedgerEntry};
use crate::error::{ChainFault, ChainFaultKind, LedgerError};
use crate::time::now_ms;

/// Default proof-of-work difficulty: leading zero hex digits of a block
/// hash.
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Append-only chain plus the pending queue and secondary indexes.
///
/// All mutation goes through [`Ledger::add_entry`] and
/// [`Ledger::commit_block`] (or [`Ledger::append_block`] on the replication
/// path). The indexes are derived state, rebuilt wholesale on import.
#[derive(Debug)]
pub struct Ledger {
    difficulty: usize,
    chain: Vec<Block>,
    pending: Vec<LedgerEntry>,
    /// entry id → (block index, entry index within the block).
    entry_index: HashMap<String, (usize, usize)>,
    /// entry kind → ids, ordered for stable iteration.
    kind_index: HashMap<EntryKind, BTreeSet<String>>,
    /// actor id → ids, ordered for stable iteration.
    actor_index: HashMap<String, BTreeSet<String>>,
}

/// Serialized form of the ledger: the chain and its difficulty. The pending
/// queue and the indexes are local state and do not travel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerExport {
    pub difficulty: usize,
    pub chain: Vec<Block>,
}

/// Point-in-time counters for dashboards and transparency reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    pub block_count: usize,
    pub entry_count: usize,
    pub pending_count: usize,
    pub difficulty: usize,
    pub latest_hash: String,
}

/// Proof that an entry is included in a block, verifiable against the
/// block's stored Merkle root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    pub block_index: u64,
    pub entry_index: usize,
    pub merkle_root: String,
    pub proof: Vec<ProofStep>,
    pub leaf_hash: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new()
    }
}

impl Ledger {
    /// A fresh ledger at the default difficulty, genesis already mined.
    pub fn new() -> Self {
        Ledger::with_difficulty(DEFAULT_DIFFICULTY)
    }

    /// A fresh ledger at a caller-chosen difficulty.
    pub fn with_difficulty(difficulty: usize) -> Self {
        let genesis = Block::mine(
            0,
            now_ms(),
            Vec::new(),
            GENESIS_PREVIOUS_HASH.to_string(),
            difficulty,
        );
        Ledger {
            difficulty,
            chain: vec![genesis],
            pending: Vec::new(),
            entry_index: HashMap::new(),
            kind_index: HashMap::new(),
            actor_index: HashMap::new(),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    pub fn pending(&self) -> &[LedgerEntry] {
        &self.pending
    }

    pub fn latest_block(&self) -> &Block {
        // The chain is never empty: genesis is mined at construction.
        &self.chain[self.chain.len() - 1]
    }

    /// Queue an entry for the next block. The stored content hash must
    /// match the entry's fields.
    pub fn add_entry(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        if !entry.verify_content_hash() {
            return Err(LedgerError::EntryHashMismatch { id: entry.id });
        }
        self.pending.push(entry);
        Ok(())
    }

    /// Seal the pending queue into a new mined block. Returns `None` when
    /// there is nothing pending.
    pub fn commit_block(&mut self) -> Option<&Block> {
        if self.pending.is_empty() {
            return None;
        }
        let entries = std::mem::take(&mut self.pending);
        let block = Block::mine(
            self.chain.len() as u64,
            now_ms(),
            entries,
            self.latest_block().hash.clone(),
            self.difficulty,
        );
        self.chain.push(block);
        self.index_block(self.chain.len() - 1);
        Some(&self.chain[self.chain.len() - 1])
    }

    /// Append a block received from a peer.
    ///
    /// The block must extend the local head, meet the local difficulty, and
    /// survive full re-verification (header hash, entry content hashes,
    /// Merkle root) before it is adopted. Gossip is not trusted.
    pub fn append_block(&mut self, block: Block) -> Result<(), LedgerError> {
        let local_head = &self.latest_block().hash;
        if block.previous_hash != *local_head {
            return Err(LedgerError::NotSequential {
                index: block.index,
                previous_hash: block.previous_hash,
                local_head: local_head.clone(),
            });
        }
        if !block::meets_difficulty(&block.hash, self.difficulty) {
            return Err(LedgerError::DifficultyNotMet {
                index: block.index,
                difficulty: self.difficulty,
            });
        }
        verify_block_contents(&block)?;
        self.chain.push(block);
        self.index_block(self.chain.len() - 1);
        Ok(())
    }

    /// Look up a committed entry by id.
    pub fn get_entry(&self, id: &str) -> Option<&LedgerEntry> {
        let (block_idx, entry_idx) = *self.entry_index.get(id)?;
        self.chain.get(block_idx)?.entries.get(entry_idx)
    }

    /// All committed entries of a kind, in index order.
    pub fn entries_by_kind(&self, kind: EntryKind) -> Vec<&LedgerEntry> {
        self.collect_ids(self.kind_index.get(&kind))
    }

    /// All committed entries by an actor, in index order.
    pub fn entries_by_actor(&self, actor_id: &str) -> Vec<&LedgerEntry> {
        self.collect_ids(self.actor_index.get(actor_id))
    }

    fn collect_ids(&self, ids: Option<&BTreeSet<String>>) -> Vec<&LedgerEntry> {
        let Some(ids) = ids else {
            return Vec::new();
        };
        let mut entries: Vec<&LedgerEntry> = ids.iter().filter_map(|id| self.get_entry(id)).collect();
        entries.sort_by_key(|e| self.entry_index.get(&e.id).copied());
        entries
    }

    /// Merkle inclusion proof for a committed entry.
    pub fn inclusion_proof(&self, entry_id: &str) -> Result<InclusionProof, LedgerError> {
        let (block_idx, entry_idx) = *self
            .entry_index
            .get(entry_id)
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))?;
        let block = &self.chain[block_idx];
        let leaves: Vec<String> = block.entries.iter().map(|e| e.hash.clone()).collect();
        let tree = MerkleTree::new(leaves);
        let proof = tree
            .proof(entry_idx)
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))?;
        Ok(InclusionProof {
            block_index: block.index,
            entry_index: entry_idx,
            merkle_root: block.merkle_root.clone(),
            proof,
            leaf_hash: block.entries[entry_idx].hash.clone(),
        })
    }

    /// Walk the whole chain and verify linkage, header hashes, entry
    /// content hashes, and Merkle roots. Short-circuits at the first fault.
    pub fn verify_chain(&self) -> Result<(), ChainFault> {
        for i in 1..self.chain.len() {
            let block = &self.chain[i];
            let fault = |kind| ChainFault {
                block_index: block.index,
                kind,
            };
            if block.previous_hash != self.chain[i - 1].hash {
                return Err(fault(ChainFaultKind::PreviousHashMismatch));
            }
            if block.hash != block.header_hash() {
                return Err(fault(ChainFaultKind::BlockHashMismatch));
            }
            for entry in &block.entries {
                if !entry.verify_content_hash() {
                    return Err(fault(ChainFaultKind::EntryHashMismatch {
                        entry_id: entry.id.clone(),
                    }));
                }
            }
            if block.merkle_root != block.recompute_merkle_root() {
                return Err(fault(ChainFaultKind::MerkleRootMismatch));
            }
        }
        Ok(())
    }

    /// Snapshot `{difficulty, chain}` for the wire or for disk.
    pub fn export(&self) -> LedgerExport {
        LedgerExport {
            difficulty: self.difficulty,
            chain: self.chain.clone(),
        }
    }

    /// Export `{difficulty, chain}` as JSON.
    pub fn to_json(&self) -> Result<Value, LedgerError> {
        serde_json::to_value(self.export()).map_err(|e| LedgerError::Import(e.to_string()))
    }

    /// Rebuild a ledger (chain plus all indexes) from its exported JSON.
    ///
    /// The import is structural only; run [`Ledger::verify_chain`] before
    /// trusting the result. Replication does exactly that before adopting.
    pub fn from_json(value: Value) -> Result<Ledger, LedgerError> {
        let export: LedgerExport =
            serde_json::from_value(value).map_err(|e| LedgerError::Import(e.to_string()))?;
        Ledger::from_export(export)
    }

    /// Rebuild a ledger from a deserialized export.
    pub fn from_export(export: LedgerExport) -> Result<Ledger, LedgerError> {
        if export.chain.is_empty() {
            return Err(LedgerError::Import("chain has no genesis block".into()));
        }
        let mut ledger = Ledger {
            difficulty: export.difficulty,
            chain: export.chain,
            pending: Vec::new(),
            entry_index: HashMap::new(),
            kind_index: HashMap::new(),
            actor_index: HashMap::new(),
        };
        for i in 0..ledger.chain.len() {
            ledger.index_block(i);
        }
        Ok(ledger)
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            block_count: self.chain.len(),
            entry_count: self.entry_index.len(),
            pending_count: self.pending.len(),
            difficulty: self.difficulty,
            latest_hash: self.latest_block().hash.clone(),
        }
    }

    fn index_block(&mut self, block_idx: usize) {
        let block = &self.chain[block_idx];
        for (entry_idx, entry) in block.entries.iter().enumerate() {
            self.entry_index
                .insert(entry.id.clone(), (block_idx, entry_idx));
            self.kind_index
                .entry(entry.kind)
                .or_default()
                .insert(entry.id.clone());
            self.actor_index
                .entry(entry.actor_id.clone())
                .or_default()
                .insert(entry.id.clone());
        }
    }
}

/// Re-verify a single block's internal consistency (header hash, entry
/// hashes, Merkle root). Linkage is the caller's concern.
fn verify_block_contents(block: &Block) -> Result<(), ChainFault> {
    let fault = |kind| ChainFault {
        block_index: block.index,
        kind,
    };
    if block.hash != block.header_hash() {
        return Err(fault(ChainFaultKind::BlockHashMismatch));
    }
    for entry in &block.entries {
        if !entry.verify_content_hash() {
            return Err(fault(ChainFaultKind::EntryHashMismatch {
                entry_id: entry.id.clone(),
            }));
        }
    }
    if block.merkle_root != block.recompute_merkle_root() {
        return Err(fault(ChainFaultKind::MerkleRootMismatch));
    }
    Ok(())
}

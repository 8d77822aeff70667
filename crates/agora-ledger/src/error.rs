use thiserror::Error;

use agora_crypto::CryptoError;

/// Where and how chain verification failed.
///
/// Verification walks the chain block by block and short-circuits at the
/// first fault, so the locus always identifies the earliest bad block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain invalid at block {block_index}: {kind}")]
pub struct ChainFault {
    /// Index of the first block that failed a check.
    pub block_index: u64,
    pub kind: ChainFaultKind,
}

/// The specific check a block failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainFaultKind {
    #[error("previousHash does not match the prior block's hash")]
    PreviousHashMismatch,

    #[error("stored block hash does not match the recomputed header hash")]
    BlockHashMismatch,

    #[error("entry {entry_id} content hash does not match its fields")]
    EntryHashMismatch { entry_id: String },

    #[error("stored Merkle root does not match the root over entry hashes")]
    MerkleRootMismatch,
}

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("entry {0} not found in any committed block")]
    EntryNotFound(String),

    #[error("entry {id} rejected: stored hash does not match its contents")]
    EntryHashMismatch { id: String },

    #[error(
        "block {index} does not extend the chain: previousHash {previous_hash} \
         vs local head {local_head}"
    )]
    NotSequential {
        index: u64,
        previous_hash: String,
        local_head: String,
    },

    #[error("block {index} rejected: hash does not meet difficulty {difficulty}")]
    DifficultyNotMet { index: u64, difficulty: usize },

    #[error(transparent)]
    Fault(#[from] ChainFault),

    #[error("ledger import failed: {0}")]
    Import(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

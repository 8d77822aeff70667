//! The append-only governance ledger.
//!
//! Every meaningful action in agora — a registration, a proposal, a
//! petition signature, a vote — becomes a [`LedgerEntry`], and entries are
//! sealed into hash-linked [`Block`]s whose contents are summarized by a
//! Merkle root. Any third party holding a copy of the chain can verify
//! integrity, inclusion, and authorship without privileged access.
//!
//! # Lifecycle
//!
//! ```ignore
//! use agora_ledger::{Ledger, LedgerEntry, EntryKind};
//! use serde_json::json;
//!
//! let mut ledger = Ledger::new();          // mines the genesis block
//! let entry = LedgerEntry::signed(
//!     EntryKind::Register,
//!     json!({"fingerprint": "ab…"}),
//!     "ab…",
//!     &private_pem,
//! )?;
//! ledger.add_entry(entry)?;                // buffered in the pending queue
//! ledger.commit_block();                   // sealed, mined, indexed
//! assert!(ledger.verify_chain().is_ok());
//! ```
//!
//! # Proof-of-work
//!
//! Blocks are mined to a small leading-zero difficulty (default 2 hex
//! digits). This is a rate limiter and a tamper-cost multiplier, not a
//! consensus mechanism; replication uses the longest-valid-chain rule.

pub mod block;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod time;

pub use block::Block;
pub use entry::{EntryKind, LedgerEntry, SYSTEM_ACTOR};
pub use error::{ChainFault, ChainFaultKind, LedgerError};
pub use ledger::{InclusionProof, Ledger, LedgerExport, LedgerStats, DEFAULT_DIFFICULTY};
pub use time::now_ms;

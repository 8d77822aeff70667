//! Cryptographic primitives for the agora governance ledger.
//!
//! This crate provides the building blocks every other agora crate hashes,
//! signs, or proves with:
//!
//! - **Canonical serialization**: deterministic JSON with lexicographically
//!   sorted keys at every depth ([`canonical`])
//! - **Hashing**: SHA3-256 digests surfaced as lowercase hex ([`hash`])
//! - **Keys**: Ed25519 key pairs in PEM form, signing and verification,
//!   public-key fingerprints ([`keys`])
//! - **Merkle trees**: pair-hashed trees with inclusion proofs ([`merkle`])
//! - **Commitments**: hash commitments for commit–reveal voting
//!   ([`commitment`])
//! - **Identifiers**: random hex ids and nonces ([`ids`])
//!
//! # Canonical form
//!
//! Signatures and content hashes are computed over the canonical JSON form
//! of a structure. Two implementations that disagree on key order, escaping,
//! or number formatting produce different bytes and therefore different
//! signatures, so [`canonical::to_canonical_json`] is the only sanctioned
//! path from a structured value to hashable bytes.

pub mod canonical;
pub mod commitment;
pub mod error;
pub mod hash;
pub mod ids;
pub mod keys;
pub mod merkle;

pub use canonical::{canonicalize, to_canonical_json};
pub use commitment::{commit, commit_with_fresh_nonce, open};
pub use error::CryptoError;
pub use hash::{hash_of, hash_value, sha3_hex};
pub use ids::{challenge_nonce, entry_id, nonce};
pub use keys::{fingerprint, generate_keypair, sign, sign_value, verify, verify_value, Keypair};
pub use merkle::{MerkleTree, ProofStep, Side};

//! Hash commitments for the commit–reveal voting window.
//!
//! A commitment binds a hidden value to `sha3_hex(value ‖ nonce)`. During
//! the commit phase only the digest is visible; the reveal phase opens it
//! by recomputation. The nonce is what keeps a three-way ballot choice from
//! being brute-forced out of the digest.

use crate::hash::sha3_hex;
use crate::ids;

/// Commit to `value` under `nonce`.
pub fn commit(value: &str, nonce: &str) -> String {
    let mut preimage = String::with_capacity(value.len() + nonce.len());
    preimage.push_str(value);
    preimage.push_str(nonce);
    sha3_hex(preimage.as_bytes())
}

/// Commit to `value` under a freshly generated 32-byte nonce.
/// Returns `(commitment, nonce)`; the caller must retain the nonce to open.
pub fn commit_with_fresh_nonce(value: &str) -> (String, String) {
    let nonce = ids::nonce();
    (commit(value, &nonce), nonce)
}

/// Open a commitment: true iff `commit(value, nonce)` reproduces it.
pub fn open(value: &str, nonce: &str, commitment: &str) -> bool {
    commit(value, nonce) == commitment
}

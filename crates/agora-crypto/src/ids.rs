//! Random identifiers and nonces.
//!
//! All identifiers in the ledger are content-independent random hex drawn
//! from the OS entropy source.

use rand::rngs::OsRng;
use rand::RngCore;

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Random 128-bit entry id (32 hex chars).
pub fn entry_id() -> String {
    random_hex(16)
}

/// Random 256-bit nonce (64 hex chars), used for vote commitments.
pub fn nonce() -> String {
    random_hex(32)
}

/// Random 256-bit challenge nonce for identity authentication.
pub fn challenge_nonce() -> String {
    random_hex(32)
}

//! Ledger entries: atomic signed actions.
//!
//! An entry binds an actor to a payload twice over: the `signature` is an
//! Ed25519 signature over the canonical form of `{actorId, payload,
//! timestamp, type}`, and the `hash` is a SHA3-256 content hash over the
//! same fields plus the random `id`. The hash is a pure function of the
//! other fields; recomputation must match during verification.
//!
//! Entries produced by the system itself (threshold crossings, tallies)
//! carry the literal actor `"SYSTEM"` and a documentary payload hash in the
//! signature slot instead of an Ed25519 signature.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use agora_crypto::{hash_value, ids, keys};

use crate::error::LedgerError;
use crate::time::now_ms;

/// Actor id used by entries the system emits on its own authority.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// The registered entry kinds.
///
/// Wire names are the SCREAMING_SNAKE discriminators that appear in the
/// `type` field of the exported JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Register,
    Attestation,
    RevokeIdentity,
    ProposalCreate,
    ProposalStateChange,
    PetitionSign,
    PetitionThresholdMet,
    VoteCommit,
    VoteReveal,
    VoteTally,
}

impl EntryKind {
    /// The wire discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Register => "REGISTER",
            EntryKind::Attestation => "ATTESTATION",
            EntryKind::RevokeIdentity => "REVOKE_IDENTITY",
            EntryKind::ProposalCreate => "PROPOSAL_CREATE",
            EntryKind::ProposalStateChange => "PROPOSAL_STATE_CHANGE",
            EntryKind::PetitionSign => "PETITION_SIGN",
            EntryKind::PetitionThresholdMet => "PETITION_THRESHOLD_MET",
            EntryKind::VoteCommit => "VOTE_COMMIT",
            EntryKind::VoteReveal => "VOTE_REVEAL",
            EntryKind::VoteTally => "VOTE_TALLY",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomic signed action, as stored in a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Random 128-bit id, hex.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Opaque structured record; its meaning belongs to the emitting
    /// registry.
    pub payload: Value,
    /// Public-key fingerprint of the actor, or [`SYSTEM_ACTOR`].
    pub actor_id: String,
    /// Hex Ed25519 signature over the signing preimage; for system entries,
    /// the SHA3-256 of the payload (documentary only).
    pub signature: String,
    /// Milliseconds since epoch.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    /// SHA3-256 content hash over `{actorId, id, payload, timestamp, type}`.
    pub hash: String,
}

impl LedgerEntry {
    /// Create an entry signed by `actor_id`'s private key.
    pub fn signed(
        kind: EntryKind,
        payload: Value,
        actor_id: &str,
        private_pem: &str,
    ) -> Result<Self, LedgerError> {
        let id = ids::entry_id();
        let timestamp_ms = now_ms();
        let signature = keys::sign_value(
            &signing_preimage(kind, &payload, actor_id, timestamp_ms),
            private_pem,
        )?;
        let hash = hash_value(&content_preimage(
            &id,
            kind,
            &payload,
            actor_id,
            timestamp_ms,
        ));
        Ok(LedgerEntry {
            id,
            kind,
            payload,
            actor_id: actor_id.to_string(),
            signature,
            timestamp_ms,
            hash,
        })
    }

    /// Create a system entry. The signature slot holds the payload hash,
    /// which documents the payload but authorizes nothing.
    pub fn system(kind: EntryKind, payload: Value) -> Self {
        let id = ids::entry_id();
        let timestamp_ms = now_ms();
        let signature = hash_value(&payload);
        let hash = hash_value(&content_preimage(
            &id,
            kind,
            &payload,
            SYSTEM_ACTOR,
            timestamp_ms,
        ));
        LedgerEntry {
            id,
            kind,
            payload,
            actor_id: SYSTEM_ACTOR.to_string(),
            signature,
            timestamp_ms,
            hash,
        }
    }

    pub fn is_system(&self) -> bool {
        self.actor_id == SYSTEM_ACTOR
    }

    /// Recompute the content hash and compare with the stored one.
    pub fn verify_content_hash(&self) -> bool {
        self.hash
            == hash_value(&content_preimage(
                &self.id,
                self.kind,
                &self.payload,
                &self.actor_id,
                self.timestamp_ms,
            ))
    }

    /// Verify the Ed25519 signature against a public key PEM.
    ///
    /// Always false for system entries; their signature slot is not a
    /// signature.
    pub fn verify_signature(&self, public_pem: &str) -> bool {
        if self.is_system() {
            return false;
        }
        keys::verify_value(
            &signing_preimage(self.kind, &self.payload, &self.actor_id, self.timestamp_ms),
            &self.signature,
            public_pem,
        )
    }
}

fn signing_preimage(kind: EntryKind, payload: &Value, actor_id: &str, timestamp_ms: u64) -> Value {
    json!({
        "actorId": actor_id,
        "payload": payload,
        "timestamp": timestamp_ms,
        "type": kind.as_str(),
    })
}

fn content_preimage(
    id: &str,
    kind: EntryKind,
    payload: &Value,
    actor_id: &str,
    timestamp_ms: u64,
) -> Value {
    json!({
        "actorId": actor_id,
        "id": id,
        "payload": payload,
        "timestamp": timestamp_ms,
        "type": kind.as_str(),
    })
}

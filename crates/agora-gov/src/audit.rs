//! The audit surface: pure-read verification over the ledger and the
//! registries.
//!
//! Nothing here mutates anything. Every report can be produced by a third
//! party holding a replica of the chain and the registry snapshots, which
//! is the point: integrity, inclusion, authorship, and tallies are all
//! independently checkable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use agora_crypto::MerkleTree;
use agora_ledger::{now_ms, EntryKind, Ledger, LedgerStats};

use crate::error::GovError;
use crate::identity::{IdentityRegistry, IdentityStats};
use crate::petition::{PetitionManager, PetitionStats};
use crate::proposal::{ProposalRegistry, ProposalStats};
use crate::voting::{BallotChoice, TallyCounts, VotingManager};

/// Chain verification outcome plus chain stats.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIntegrityReport {
    pub valid: bool,
    /// Index of the first faulty block, when invalid.
    pub block_index: Option<u64>,
    /// Human-readable fault description, when invalid.
    pub error: Option<String>,
    pub stats: LedgerStats,
}

/// Inclusion-proof verification outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionReport {
    pub entry_id: String,
    pub block_index: u64,
    pub merkle_root: String,
    pub valid: bool,
}

/// Signature verification outcome for one entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureReport {
    pub entry_id: String,
    pub actor_id: String,
    pub system: bool,
    pub content_hash_valid: bool,
    pub signature_valid: bool,
    pub note: Option<String>,
}

/// Compact view of one ledger entry for activity listings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub actor_id: String,
    pub timestamp: u64,
}

/// Independent re-count of a proposal's revealed votes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetallyReport {
    pub proposal_id: String,
    pub recounted: TallyCounts,
    pub recorded: Option<TallyCounts>,
    /// True when a recorded tally exists and the recount matches it.
    pub matches: bool,
}

/// Whole-system snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyReport {
    pub generated_at: u64,
    pub chain_valid: bool,
    pub ledger: LedgerStats,
    pub identities: IdentityStats,
    pub proposals: ProposalStats,
    pub petitions: PetitionStats,
}

/// Read-only view over the ledger and the registries.
pub struct AuditEngine<'a> {
    ledger: &'a Ledger,
    identities: &'a IdentityRegistry,
    proposals: &'a ProposalRegistry,
    petitions: &'a PetitionManager,
    voting: &'a VotingManager,
}

impl<'a> AuditEngine<'a> {
    pub fn new(
        ledger: &'a Ledger,
        identities: &'a IdentityRegistry,
        proposals: &'a ProposalRegistry,
        petitions: &'a PetitionManager,
        voting: &'a VotingManager,
    ) -> Self {
        AuditEngine {
            ledger,
            identities,
            proposals,
            petitions,
            voting,
        }
    }

    /// Full chain walk plus stats.
    pub fn verify_chain_integrity(&self) -> ChainIntegrityReport {
        match self.ledger.verify_chain() {
            Ok(()) => ChainIntegrityReport {
                valid: true,
                block_index: None,
                error: None,
                stats: self.ledger.stats(),
            },
            Err(fault) => ChainIntegrityReport {
                valid: false,
                block_index: Some(fault.block_index),
                error: Some(fault.to_string()),
                stats: self.ledger.stats(),
            },
        }
    }

    /// Fetch an entry's inclusion proof and verify it against the block's
    /// stored Merkle root.
    pub fn verify_entry_inclusion(&self, entry_id: &str) -> Result<InclusionReport, GovError> {
        let proof = self
            .ledger
            .inclusion_proof(entry_id)
            .map_err(|_| GovError::EntryNotFound(entry_id.to_string()))?;
        let valid = MerkleTree::verify_proof(&proof.leaf_hash, &proof.proof, &proof.merkle_root);
        Ok(InclusionReport {
            entry_id: entry_id.to_string(),
            block_index: proof.block_index,
            merkle_root: proof.merkle_root,
            valid,
        })
    }

    /// Re-verify one entry's content hash and signature.
    ///
    /// SYSTEM entries report `signature_valid: true` with a note: their
    /// signature slot is a documentary payload hash, not an authorization.
    pub fn verify_entry_signature(&self, entry_id: &str) -> Result<SignatureReport, GovError> {
        let entry = self
            .ledger
            .get_entry(entry_id)
            .ok_or_else(|| GovError::EntryNotFound(entry_id.to_string()))?;
        let content_hash_valid = entry.verify_content_hash();

        if entry.is_system() {
            return Ok(SignatureReport {
                entry_id: entry.id.clone(),
                actor_id: entry.actor_id.clone(),
                system: true,
                content_hash_valid,
                signature_valid: true,
                note: Some("system entry: signature slot holds the payload hash".into()),
            });
        }

        let (signature_valid, note) = match self.identities.get(&entry.actor_id) {
            Some(identity) => (entry.verify_signature(&identity.public_key), None),
            None => (false, Some("actor is not a registered identity".into())),
        };
        Ok(SignatureReport {
            entry_id: entry.id.clone(),
            actor_id: entry.actor_id.clone(),
            system: false,
            content_hash_valid,
            signature_valid,
            note,
        })
    }

    /// Every committed entry acted by `fp`, in chain order.
    pub fn identity_activity(&self, fp: &str) -> Vec<EntrySummary> {
        self.ledger
            .entries_by_actor(fp)
            .into_iter()
            .map(summarize)
            .collect()
    }

    /// Every committed entry touching a proposal, in chain order.
    ///
    /// An entry touches a proposal when its payload carries a matching
    /// `proposalId`.
    pub fn proposal_history(&self, proposal_id: &str) -> Vec<EntrySummary> {
        self.ledger
            .chain()
            .iter()
            .flat_map(|b| b.entries.iter())
            .filter(|e| e.payload.get("proposalId").and_then(Value::as_str) == Some(proposal_id))
            .map(summarize)
            .collect()
    }

    /// Re-count a proposal's `VOTE_REVEAL` entries and compare against the
    /// recorded tally.
    pub fn verify_proposal_votes(&self, proposal_id: &str) -> Result<RetallyReport, GovError> {
        self.proposals.require(proposal_id)?;

        let mut recounted = TallyCounts::default();
        for entry in self.ledger.entries_by_kind(EntryKind::VoteReveal) {
            if entry.payload.get("proposalId").and_then(Value::as_str) != Some(proposal_id) {
                continue;
            }
            let choice = entry
                .payload
                .get("choice")
                .and_then(Value::as_str)
                .and_then(BallotChoice::parse);
            if let Some(choice) = choice {
                recounted.record(choice);
            }
        }

        let recorded = self
            .voting
            .session(proposal_id)
            .and_then(|s| s.tally_result.as_ref())
            .map(|t| t.counts)
            .or_else(|| {
                self.proposals
                    .get(proposal_id)
                    .and_then(|p| p.tally_result.as_ref())
                    .map(|t| t.counts)
            });

        Ok(RetallyReport {
            proposal_id: proposal_id.to_string(),
            matches: recorded == Some(recounted),
            recounted,
            recorded,
        })
    }

    /// Snapshot of everything: chain verdict plus per-registry stats.
    pub fn transparency_report(&self) -> TransparencyReport {
        TransparencyReport {
            generated_at: now_ms(),
            chain_valid: self.ledger.verify_chain().is_ok(),
            ledger: self.ledger.stats(),
            identities: self.identities.stats(),
            proposals: self.proposals.stats(),
            petitions: self.petitions.stats(),
        }
    }

    /// The full ledger export, as any replica would publish it.
    pub fn export_ledger(&self) -> Result<Value, GovError> {
        Ok(self.ledger.to_json()?)
    }
}

fn summarize(entry: &agora_ledger::LedgerEntry) -> EntrySummary {
    EntrySummary {
        id: entry.id.clone(),
        kind: entry.kind,
        actor_id: entry.actor_id.clone(),
        timestamp: entry.timestamp_ms,
    }
}

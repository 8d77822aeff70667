//! Petitions: thresholded signature collection that advances a proposal
//! toward a vote.
//!
//! A petition signature is two signatures. The acknowledgement signature
//! covers `"I_ACKNOWLEDGE_IMPLICATIONS:" ‖ implicationsHash`, binding the
//! signer to the consequences they read. The petition signature covers the
//! canonical `{action, implicationsHash, proposalId, signer}` record,
//! binding the act of signing itself. Both verify against the signer's
//! registered key, so a later audit can replay them from the ledger.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::json;

use agora_crypto::{hash_of, ids, keys};
use agora_ledger::{now_ms, EntryKind, Ledger, LedgerEntry};

use crate::error::GovError;
use crate::identity::IdentityRegistry;
use crate::proposal::{ProposalRegistry, ProposalState};

/// Signatures required before a petition advances its proposal.
pub const DEFAULT_PETITION_THRESHOLD: usize = 300;

/// Prefix of the acknowledgement signature's preimage.
pub const ACKNOWLEDGEMENT_PREFIX: &str = "I_ACKNOWLEDGE_IMPLICATIONS:";

/// One signer's record on a petition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionSignature {
    pub signature_id: String,
    /// Signer's fingerprint.
    pub signer: String,
    /// Hash of the proposal's implications at signing time.
    pub implications_hash: String,
    /// Over `"I_ACKNOWLEDGE_IMPLICATIONS:" ‖ implicationsHash`.
    pub acknowledgement_signature: String,
    /// Over canonical `{action, implicationsHash, proposalId, signer}`.
    pub petition_signature: String,
    pub signed_at: u64,
}

/// A per-proposal signature collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Petition {
    pub proposal_id: String,
    pub jurisdiction: String,
    pub threshold: usize,
    /// Keyed by signer fingerprint: set semantics on the signer.
    pub signatures: BTreeMap<String, PetitionSignature>,
    /// Monotonic: becomes true exactly once.
    pub threshold_met: bool,
    pub threshold_met_at: Option<u64>,
    pub created_at: u64,
}

impl Petition {
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }
}

/// Outcome of replaying a stored petition signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureVerification {
    pub valid: bool,
    pub acknowledgement_valid: bool,
    pub petition_signature_valid: bool,
}

/// Counters for the transparency report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionStats {
    pub total: usize,
    pub threshold_met: usize,
    pub signatures: usize,
}

#[derive(Debug, Default)]
pub struct PetitionManager {
    petitions: HashMap<String, Petition>,
}

impl PetitionManager {
    pub fn new() -> Self {
        PetitionManager::default()
    }

    /// Open a petition for a proposal currently in `PETITION`.
    pub fn create(
        &mut self,
        proposals: &ProposalRegistry,
        proposal_id: &str,
        threshold: Option<usize>,
    ) -> Result<(), GovError> {
        let proposal = proposals.require(proposal_id)?;
        if proposal.state != ProposalState::Petition {
            return Err(GovError::State(format!(
                "petitions open only in PETITION, proposal is {}",
                proposal.state
            )));
        }
        if self.petitions.contains_key(proposal_id) {
            return Err(GovError::Duplicate(format!(
                "petition for proposal {proposal_id} already exists"
            )));
        }
        self.petitions.insert(
            proposal_id.to_string(),
            Petition {
                proposal_id: proposal_id.to_string(),
                jurisdiction: proposal.jurisdiction.clone(),
                threshold: threshold.unwrap_or(DEFAULT_PETITION_THRESHOLD),
                signatures: BTreeMap::new(),
                threshold_met: false,
                threshold_met_at: None,
                created_at: now_ms(),
            },
        );
        Ok(())
    }

    pub fn get(&self, proposal_id: &str) -> Option<&Petition> {
        self.petitions.get(proposal_id)
    }

    /// Sign a petition.
    ///
    /// Emits a signed `PETITION_SIGN` entry; when the signature crosses the
    /// threshold, also emits a system `PETITION_THRESHOLD_MET` entry and
    /// advances the proposal `PETITION → OPEN` in the same call, preserving
    /// causal order on the ledger.
    pub fn sign(
        &mut self,
        ledger: &mut Ledger,
        identities: &IdentityRegistry,
        proposals: &mut ProposalRegistry,
        proposal_id: &str,
        signer_fp: &str,
        signer_private_pem: &str,
    ) -> Result<(), GovError> {
        let petition = self
            .petitions
            .get(proposal_id)
            .ok_or_else(|| GovError::PetitionNotFound(proposal_id.to_string()))?;
        if petition.threshold_met {
            return Err(GovError::State(format!(
                "petition for proposal {proposal_id} already met its threshold"
            )));
        }
        identities.require_active(signer_fp)?;
        if petition.signatures.contains_key(signer_fp) {
            return Err(GovError::Duplicate(format!(
                "{signer_fp} already signed this petition"
            )));
        }

        let proposal = proposals.require(proposal_id)?;
        let implications_hash = hash_of(&proposal.implications)?;

        let acknowledgement_signature = keys::sign(
            format!("{ACKNOWLEDGEMENT_PREFIX}{implications_hash}").as_bytes(),
            signer_private_pem,
        )?;
        let petition_signature = keys::sign_value(
            &json!({
                "action": "PETITION_SIGN",
                "implicationsHash": implications_hash,
                "proposalId": proposal_id,
                "signer": signer_fp,
            }),
            signer_private_pem,
        )?;

        let signature = PetitionSignature {
            signature_id: ids::entry_id(),
            signer: signer_fp.to_string(),
            implications_hash: implications_hash.clone(),
            acknowledgement_signature,
            petition_signature,
            signed_at: now_ms(),
        };

        let (count, threshold) = {
            let petition = self
                .petitions
                .get_mut(proposal_id)
                .ok_or_else(|| GovError::PetitionNotFound(proposal_id.to_string()))?;
            petition
                .signatures
                .insert(signer_fp.to_string(), signature.clone());
            (petition.signature_count(), petition.threshold)
        };

        let entry = LedgerEntry::signed(
            EntryKind::PetitionSign,
            json!({
                "implicationsHash": implications_hash,
                "proposalId": proposal_id,
                "signatureCount": count,
                "signatureId": signature.signature_id,
                "threshold": threshold,
            }),
            signer_fp,
            signer_private_pem,
        )?;
        ledger.add_entry(entry)?;

        if count >= threshold {
            self.mark_threshold_met(ledger, proposals, proposal_id, count, threshold)?;
        }
        Ok(())
    }

    /// Replay both stored signatures for a signer against their currently
    /// registered public key.
    pub fn verify_signature(
        &self,
        identities: &IdentityRegistry,
        proposals: &ProposalRegistry,
        proposal_id: &str,
        signer_fp: &str,
    ) -> Result<SignatureVerification, GovError> {
        let petition = self
            .petitions
            .get(proposal_id)
            .ok_or_else(|| GovError::PetitionNotFound(proposal_id.to_string()))?;
        let signature = petition
            .signatures
            .get(signer_fp)
            .ok_or_else(|| GovError::Auth(format!("{signer_fp} has not signed this petition")))?;
        let identity = identities
            .get(signer_fp)
            .ok_or_else(|| GovError::IdentityNotFound(signer_fp.to_string()))?;

        let proposal = proposals.require(proposal_id)?;
        let implications_hash = hash_of(&proposal.implications)?;

        let acknowledgement_valid = signature.implications_hash == implications_hash
            && keys::verify(
                format!("{ACKNOWLEDGEMENT_PREFIX}{implications_hash}").as_bytes(),
                &signature.acknowledgement_signature,
                &identity.public_key,
            );
        let petition_signature_valid = keys::verify_value(
            &json!({
                "action": "PETITION_SIGN",
                "implicationsHash": signature.implications_hash,
                "proposalId": proposal_id,
                "signer": signer_fp,
            }),
            &signature.petition_signature,
            &identity.public_key,
        );

        Ok(SignatureVerification {
            valid: acknowledgement_valid && petition_signature_valid,
            acknowledgement_valid,
            petition_signature_valid,
        })
    }

    pub fn stats(&self) -> PetitionStats {
        PetitionStats {
            total: self.petitions.len(),
            threshold_met: self.petitions.values().filter(|p| p.threshold_met).count(),
            signatures: self.petitions.values().map(Petition::signature_count).sum(),
        }
    }

    fn mark_threshold_met(
        &mut self,
        ledger: &mut Ledger,
        proposals: &mut ProposalRegistry,
        proposal_id: &str,
        count: usize,
        threshold: usize,
    ) -> Result<(), GovError> {
        let petition = self
            .petitions
            .get_mut(proposal_id)
            .ok_or_else(|| GovError::PetitionNotFound(proposal_id.to_string()))?;
        petition.threshold_met = true;
        petition.threshold_met_at = Some(now_ms());

        let entry = LedgerEntry::system(
            EntryKind::PetitionThresholdMet,
            json!({
                "proposalId": proposal_id,
                "signatureCount": count,
                "threshold": threshold,
            }),
        );
        ledger.add_entry(entry)?;

        proposals.transition_system(ledger, proposal_id, ProposalState::Open)
    }
}

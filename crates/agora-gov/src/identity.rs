//! Identity registry: public keys, challenge–response authentication,
//! attestations, and revocation.
//!
//! A participant's identity is the SHA3-256 fingerprint of their public-key
//! PEM. Registration, attestation, and revocation each emit a signed ledger
//! entry, so the registry's in-memory maps can always be audited against
//! the chain.
//!
//! # Challenges
//!
//! `issue_challenge` hands out a random nonce; `verify_challenge` checks an
//! Ed25519 signature over it. A challenge is single-use — consumed on any
//! verification attempt, valid or not — and expires five minutes after
//! issue. Expired challenges are swept on every issue so an abandoned
//! challenge cannot grow the store without bound.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::json;

use agora_crypto::{fingerprint, ids, keys};
use agora_ledger::{now_ms, EntryKind, Ledger, LedgerEntry};

use crate::error::GovError;

/// Challenge lifetime: five minutes.
pub const CHALLENGE_TTL_MS: u64 = 5 * 60 * 1000;

/// Jurisdiction wildcard: matches every filter.
pub const GLOBAL_JURISDICTION: &str = "global";

/// A registered participant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// SPKI PEM of the public key.
    pub public_key: String,
    /// SHA3-256 of the trimmed PEM; the participant's stable id.
    pub fingerprint: String,
    pub alias: String,
    /// Opaque region tag; [`GLOBAL_JURISDICTION`] matches any filter.
    pub jurisdiction: String,
    pub registered_at: u64,
    pub attestations: Vec<Attestation>,
    pub revoked: bool,
}

/// A trusted attestor's claim about an identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    /// Fingerprint of the attestor.
    pub attestor: String,
    pub claim: String,
    /// Hex signature over canonical `{claim, subject}`.
    pub signature: String,
    pub attested_at: u64,
}

/// Input to [`IdentityRegistry::register`].
#[derive(Clone, Debug)]
pub struct RegistrationRequest {
    pub public_key_pem: String,
    pub alias: String,
    pub jurisdiction: String,
    /// Signs the `REGISTER` entry on the registrant's behalf.
    pub private_key_pem: String,
}

#[derive(Debug, Clone)]
struct Challenge {
    nonce: String,
    issued_at: u64,
}

/// Point-in-time registry counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityStats {
    pub total: usize,
    pub active: usize,
    pub revoked: usize,
    pub trusted_attestors: usize,
}

/// The registry itself. Mutations emit ledger entries; reads are free.
#[derive(Debug)]
pub struct IdentityRegistry {
    identities: BTreeMap<String, Identity>,
    trusted_attestors: HashSet<String>,
    challenges: HashMap<String, Challenge>,
    challenge_ttl_ms: u64,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        IdentityRegistry::new()
    }
}

impl IdentityRegistry {
    pub fn new() -> Self {
        IdentityRegistry {
            identities: BTreeMap::new(),
            trusted_attestors: HashSet::new(),
            challenges: HashMap::new(),
            challenge_ttl_ms: CHALLENGE_TTL_MS,
        }
    }

    /// Override the challenge lifetime. Tests shrink it to observe expiry.
    pub fn with_challenge_ttl(ttl_ms: u64) -> Self {
        IdentityRegistry {
            challenge_ttl_ms: ttl_ms,
            ..IdentityRegistry::new()
        }
    }

    /// Register a new identity and emit a signed `REGISTER` entry.
    pub fn register(
        &mut self,
        ledger: &mut Ledger,
        request: RegistrationRequest,
    ) -> Result<String, GovError> {
        if request.public_key_pem.trim().is_empty() {
            return Err(GovError::Validation("public key must not be empty".into()));
        }
        if request.alias.trim().is_empty() {
            return Err(GovError::Validation("alias must not be empty".into()));
        }
        let fp = fingerprint(&request.public_key_pem);
        if self.identities.contains_key(&fp) {
            return Err(GovError::Duplicate(format!(
                "identity {fp} is already registered"
            )));
        }

        let identity = Identity {
            public_key: request.public_key_pem.clone(),
            fingerprint: fp.clone(),
            alias: request.alias.clone(),
            jurisdiction: request.jurisdiction.clone(),
            registered_at: now_ms(),
            attestations: Vec::new(),
            revoked: false,
        };

        let entry = LedgerEntry::signed(
            EntryKind::Register,
            json!({
                "alias": request.alias,
                "fingerprint": fp,
                "jurisdiction": request.jurisdiction,
                "publicKey": request.public_key_pem,
            }),
            &fp,
            &request.private_key_pem,
        )?;
        ledger.add_entry(entry)?;

        self.identities.insert(fp.clone(), identity);
        Ok(fp)
    }

    pub fn get(&self, fp: &str) -> Option<&Identity> {
        self.identities.get(fp)
    }

    /// True when the identity exists and has not been revoked.
    pub fn is_active(&self, fp: &str) -> bool {
        self.identities.get(fp).is_some_and(|i| !i.revoked)
    }

    /// Fetch an identity, failing on unknown or revoked fingerprints.
    pub fn require_active(&self, fp: &str) -> Result<&Identity, GovError> {
        let identity = self
            .identities
            .get(fp)
            .ok_or_else(|| GovError::IdentityNotFound(fp.to_string()))?;
        if identity.revoked {
            return Err(GovError::Auth(format!("identity {fp} is revoked")));
        }
        Ok(identity)
    }

    /// Issue a single-use authentication challenge for `fp`.
    pub fn issue_challenge(&mut self, fp: &str) -> Result<String, GovError> {
        self.sweep_expired_challenges();
        if !self.identities.contains_key(fp) {
            return Err(GovError::IdentityNotFound(fp.to_string()));
        }
        let nonce = ids::challenge_nonce();
        self.challenges.insert(
            fp.to_string(),
            Challenge {
                nonce: nonce.clone(),
                issued_at: now_ms(),
            },
        );
        Ok(nonce)
    }

    /// Verify a signature over the outstanding challenge nonce.
    ///
    /// The challenge is consumed whether or not the signature verifies.
    pub fn verify_challenge(&mut self, fp: &str, signed_nonce_hex: &str) -> Result<bool, GovError> {
        let challenge = self
            .challenges
            .remove(fp)
            .ok_or_else(|| GovError::Auth(format!("no outstanding challenge for {fp}")))?;
        if now_ms().saturating_sub(challenge.issued_at) > self.challenge_ttl_ms {
            return Err(GovError::Auth("challenge expired".into()));
        }
        let identity = self
            .identities
            .get(fp)
            .ok_or_else(|| GovError::IdentityNotFound(fp.to_string()))?;
        Ok(keys::verify(
            challenge.nonce.as_bytes(),
            signed_nonce_hex,
            &identity.public_key,
        ))
    }

    /// Mark a fingerprint as a trusted attestor.
    pub fn add_trusted_attestor(&mut self, fp: &str) {
        self.trusted_attestors.insert(fp.to_string());
    }

    pub fn is_trusted_attestor(&self, fp: &str) -> bool {
        self.trusted_attestors.contains(fp)
    }

    /// Attach an attestation to `subject` and emit a signed `ATTESTATION`
    /// entry. The attestor must be in the trusted set and active.
    pub fn add_attestation(
        &mut self,
        ledger: &mut Ledger,
        subject_fp: &str,
        attestor_fp: &str,
        claim: &str,
        attestor_private_pem: &str,
    ) -> Result<(), GovError> {
        if claim.trim().is_empty() {
            return Err(GovError::Validation("claim must not be empty".into()));
        }
        if !self.trusted_attestors.contains(attestor_fp) {
            return Err(GovError::Auth(format!(
                "{attestor_fp} is not a trusted attestor"
            )));
        }
        self.require_active(attestor_fp)?;
        if !self.identities.contains_key(subject_fp) {
            return Err(GovError::IdentityNotFound(subject_fp.to_string()));
        }

        let signature = keys::sign_value(
            &json!({"claim": claim, "subject": subject_fp}),
            attestor_private_pem,
        )?;
        let entry = LedgerEntry::signed(
            EntryKind::Attestation,
            json!({
                "attestor": attestor_fp,
                "claim": claim,
                "subject": subject_fp,
            }),
            attestor_fp,
            attestor_private_pem,
        )?;
        ledger.add_entry(entry)?;

        let attestation = Attestation {
            attestor: attestor_fp.to_string(),
            claim: claim.to_string(),
            signature,
            attested_at: now_ms(),
        };
        if let Some(identity) = self.identities.get_mut(subject_fp) {
            identity.attestations.push(attestation);
        }
        Ok(())
    }

    pub fn has_attestation(&self, fp: &str, claim: &str) -> bool {
        self.identities
            .get(fp)
            .is_some_and(|i| i.attestations.iter().any(|a| a.claim == claim))
    }

    /// Revoke an identity and emit a signed `REVOKE_IDENTITY` entry.
    pub fn revoke(
        &mut self,
        ledger: &mut Ledger,
        fp: &str,
        private_key_pem: &str,
    ) -> Result<(), GovError> {
        let identity = self
            .identities
            .get(fp)
            .ok_or_else(|| GovError::IdentityNotFound(fp.to_string()))?;
        if identity.revoked {
            return Err(GovError::State(format!("identity {fp} is already revoked")));
        }

        let entry = LedgerEntry::signed(
            EntryKind::RevokeIdentity,
            json!({"fingerprint": fp}),
            fp,
            private_key_pem,
        )?;
        ledger.add_entry(entry)?;

        if let Some(identity) = self.identities.get_mut(fp) {
            identity.revoked = true;
        }
        Ok(())
    }

    /// Whether an identity satisfies a jurisdiction filter. Identities
    /// registered under [`GLOBAL_JURISDICTION`] match every filter; a
    /// filter of `None` or `"global"` matches every identity.
    pub fn matches_jurisdiction(identity: &Identity, filter: Option<&str>) -> bool {
        match filter {
            None => true,
            Some(GLOBAL_JURISDICTION) => true,
            Some(j) => identity.jurisdiction == j || identity.jurisdiction == GLOBAL_JURISDICTION,
        }
    }

    /// Active identities under a jurisdiction filter.
    pub fn by_jurisdiction(&self, jurisdiction: &str) -> Vec<&Identity> {
        self.identities
            .values()
            .filter(|i| !i.revoked && Self::matches_jurisdiction(i, Some(jurisdiction)))
            .collect()
    }

    /// Count of active identities matching a jurisdiction filter; the
    /// denominator of the quorum computation.
    pub fn eligible_count(&self, filter: Option<&str>) -> usize {
        self.identities
            .values()
            .filter(|i| !i.revoked && Self::matches_jurisdiction(i, filter))
            .count()
    }

    pub fn active_count(&self) -> usize {
        self.identities.values().filter(|i| !i.revoked).count()
    }

    pub fn stats(&self) -> IdentityStats {
        let active = self.active_count();
        IdentityStats {
            total: self.identities.len(),
            active,
            revoked: self.identities.len() - active,
            trusted_attestors: self.trusted_attestors.len(),
        }
    }

    fn sweep_expired_challenges(&mut self) {
        let now = now_ms();
        let ttl = self.challenge_ttl_ms;
        self.challenges
            .retain(|_, c| now.saturating_sub(c.issued_at) <= ttl);
    }
}

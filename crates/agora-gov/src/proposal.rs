//! Proposals: versioned legislative items with a lifecycle state machine.
//!
//! The permitted transitions:
//!
//! ```text
//! DRAFT → {PETITION, OPEN}
//! PETITION → {OPEN, EXPIRED}
//! OPEN → {VOTING, EXPIRED}
//! VOTING → {TALLYING}
//! TALLYING → {ENACTED, REJECTED}
//! ENACTED → {AMENDED}
//! ```
//!
//! Everything else is refused without mutation. Text changes append a new
//! immutable [`ProposalVersion`]; prior versions are never touched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use agora_crypto::{hash_value, ids};
use agora_ledger::{now_ms, EntryKind, Ledger, LedgerEntry};

use crate::error::GovError;
use crate::identity::IdentityRegistry;
use crate::voting::TallyResult;

/// What kind of legislative item a proposal is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalKind {
    Law,
    Amendment,
    Repeal,
    Resolution,
}

/// Lifecycle state of a proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalState {
    Draft,
    Petition,
    Open,
    Voting,
    Tallying,
    Enacted,
    Rejected,
    Expired,
    Amended,
}

impl ProposalState {
    /// Whether the state machine permits moving to `to`.
    pub fn can_transition(self, to: ProposalState) -> bool {
        use ProposalState::*;
        matches!(
            (self, to),
            (Draft, Petition)
                | (Draft, Open)
                | (Petition, Open)
                | (Petition, Expired)
                | (Open, Voting)
                | (Open, Expired)
                | (Voting, Tallying)
                | (Tallying, Enacted)
                | (Tallying, Rejected)
                | (Enacted, Amended)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalState::Draft => "DRAFT",
            ProposalState::Petition => "PETITION",
            ProposalState::Open => "OPEN",
            ProposalState::Voting => "VOTING",
            ProposalState::Tallying => "TALLYING",
            ProposalState::Enacted => "ENACTED",
            ProposalState::Rejected => "REJECTED",
            ProposalState::Expired => "EXPIRED",
            ProposalState::Amended => "AMENDED",
        }
    }
}

impl std::fmt::Display for ProposalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable snapshot of a proposal's text.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalVersion {
    /// 1-based version number.
    pub version: u32,
    pub full_text: String,
    pub summary: String,
    pub implications: Vec<String>,
    /// SHA3-256 over canonical `{fullText, implications, summary}`.
    pub hash: String,
    pub created_at: u64,
}

/// Parameters for the voting window.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingConfig {
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    /// Revealed-ballot percentage of eligible voters required to bind.
    pub quorum_percent: f64,
    /// YEA percentage of non-abstain votes that must be exceeded to pass.
    pub pass_percent: f64,
    /// Restrict eligibility to one jurisdiction. `None` or `"global"`
    /// admits every registered voter.
    pub eligible_jurisdiction: Option<String>,
}

impl Default for VotingConfig {
    fn default() -> Self {
        VotingConfig {
            start_time: None,
            end_time: None,
            quorum_percent: 10.0,
            pass_percent: 50.0,
            eligible_jurisdiction: None,
        }
    }
}

/// A legislative item and its whole history.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProposalKind,
    pub title: String,
    pub full_text: String,
    pub summary: String,
    /// Consequences a petition signer must acknowledge. Never empty.
    pub implications: Vec<String>,
    pub jurisdiction: String,
    /// For amendments: the proposal being amended.
    pub amendment_of: Option<String>,
    pub author_fingerprint: String,
    pub state: ProposalState,
    pub versions: Vec<ProposalVersion>,
    pub voting_config: Option<VotingConfig>,
    pub tally_result: Option<TallyResult>,
    pub created_at: u64,
}

/// Input to [`ProposalRegistry::create`].
#[derive(Clone, Debug)]
pub struct ProposalDraft {
    pub kind: ProposalKind,
    pub title: String,
    pub full_text: String,
    pub summary: String,
    pub implications: Vec<String>,
    pub jurisdiction: String,
    pub amendment_of: Option<String>,
    pub author_fingerprint: String,
    /// Signs the `PROPOSAL_CREATE` entry on the author's behalf.
    pub author_private_key: String,
}

/// Per-state proposal counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStats {
    pub total: usize,
    pub by_state: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct ProposalRegistry {
    proposals: BTreeMap<String, Proposal>,
}

impl ProposalRegistry {
    pub fn new() -> Self {
        ProposalRegistry::default()
    }

    /// Create a proposal in `DRAFT` with `versions[0]` populated, emitting
    /// a signed `PROPOSAL_CREATE` entry.
    pub fn create(
        &mut self,
        ledger: &mut Ledger,
        identities: &IdentityRegistry,
        draft: ProposalDraft,
    ) -> Result<String, GovError> {
        identities.require_active(&draft.author_fingerprint)?;
        if draft.title.trim().is_empty() {
            return Err(GovError::Validation("title must not be empty".into()));
        }
        if draft.full_text.trim().is_empty() {
            return Err(GovError::Validation("fullText must not be empty".into()));
        }
        if draft.implications.is_empty() {
            return Err(GovError::Validation(
                "a proposal needs at least one implication".into(),
            ));
        }

        let id = ids::entry_id();
        let created_at = now_ms();
        let version = ProposalVersion {
            version: 1,
            full_text: draft.full_text.clone(),
            summary: draft.summary.clone(),
            implications: draft.implications.clone(),
            hash: version_hash(&draft.full_text, &draft.summary, &draft.implications),
            created_at,
        };

        let entry = LedgerEntry::signed(
            EntryKind::ProposalCreate,
            json!({
                "jurisdiction": draft.jurisdiction,
                "proposalId": id,
                "title": draft.title,
                "type": draft.kind,
                "versionHash": version.hash,
            }),
            &draft.author_fingerprint,
            &draft.author_private_key,
        )?;
        ledger.add_entry(entry)?;

        let proposal = Proposal {
            id: id.clone(),
            kind: draft.kind,
            title: draft.title,
            full_text: draft.full_text,
            summary: draft.summary,
            implications: draft.implications,
            jurisdiction: draft.jurisdiction,
            amendment_of: draft.amendment_of,
            author_fingerprint: draft.author_fingerprint,
            state: ProposalState::Draft,
            versions: vec![version],
            voting_config: None,
            tally_result: None,
            created_at,
        };
        self.proposals.insert(id.clone(), proposal);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&Proposal, GovError> {
        self.proposals
            .get(id)
            .ok_or_else(|| GovError::ProposalNotFound(id.to_string()))
    }

    /// Append a new text version. Permitted only in `DRAFT` or `OPEN`.
    pub fn add_version(
        &mut self,
        id: &str,
        full_text: String,
        summary: String,
        implications: Vec<String>,
    ) -> Result<u32, GovError> {
        if implications.is_empty() {
            return Err(GovError::Validation(
                "a version needs at least one implication".into(),
            ));
        }
        let proposal = self
            .proposals
            .get_mut(id)
            .ok_or_else(|| GovError::ProposalNotFound(id.to_string()))?;
        if !matches!(proposal.state, ProposalState::Draft | ProposalState::Open) {
            return Err(GovError::State(format!(
                "versions can only be added in DRAFT or OPEN, not {}",
                proposal.state
            )));
        }

        let number = proposal.versions.len() as u32 + 1;
        proposal.versions.push(ProposalVersion {
            version: number,
            full_text: full_text.clone(),
            summary: summary.clone(),
            implications: implications.clone(),
            hash: version_hash(&full_text, &summary, &implications),
            created_at: now_ms(),
        });
        proposal.full_text = full_text;
        proposal.summary = summary;
        proposal.implications = implications;
        Ok(number)
    }

    /// Record the voting window parameters. Only meaningful before the
    /// vote opens.
    pub fn set_voting_config(&mut self, id: &str, config: VotingConfig) -> Result<(), GovError> {
        let proposal = self
            .proposals
            .get_mut(id)
            .ok_or_else(|| GovError::ProposalNotFound(id.to_string()))?;
        if !matches!(
            proposal.state,
            ProposalState::Draft | ProposalState::Petition | ProposalState::Open
        ) {
            return Err(GovError::State(format!(
                "voting config cannot change in {}",
                proposal.state
            )));
        }
        proposal.voting_config = Some(config);
        Ok(())
    }

    /// Actor-signed state transition, emitting `PROPOSAL_STATE_CHANGE`.
    pub fn transition(
        &mut self,
        ledger: &mut Ledger,
        id: &str,
        to: ProposalState,
        actor_fp: &str,
        actor_private_pem: &str,
    ) -> Result<(), GovError> {
        let from = self.check_transition(id, to)?;
        let entry = LedgerEntry::signed(
            EntryKind::ProposalStateChange,
            transition_payload(id, from, to),
            actor_fp,
            actor_private_pem,
        )?;
        ledger.add_entry(entry)?;
        self.apply_transition(id, to);
        Ok(())
    }

    /// System-initiated transition (threshold crossings, tally outcomes).
    pub fn transition_system(
        &mut self,
        ledger: &mut Ledger,
        id: &str,
        to: ProposalState,
    ) -> Result<(), GovError> {
        let from = self.check_transition(id, to)?;
        let entry =
            LedgerEntry::system(EntryKind::ProposalStateChange, transition_payload(id, from, to));
        ledger.add_entry(entry)?;
        self.apply_transition(id, to);
        Ok(())
    }

    /// Attach the final tally to an already-decided proposal.
    pub fn attach_tally(&mut self, id: &str, tally: TallyResult) -> Result<(), GovError> {
        let proposal = self
            .proposals
            .get_mut(id)
            .ok_or_else(|| GovError::ProposalNotFound(id.to_string()))?;
        proposal.tally_result = Some(tally);
        Ok(())
    }

    pub fn by_state(&self, state: ProposalState) -> Vec<&Proposal> {
        self.proposals.values().filter(|p| p.state == state).collect()
    }

    pub fn stats(&self) -> ProposalStats {
        let mut by_state: BTreeMap<String, usize> = BTreeMap::new();
        for proposal in self.proposals.values() {
            *by_state.entry(proposal.state.to_string()).or_default() += 1;
        }
        ProposalStats {
            total: self.proposals.len(),
            by_state,
        }
    }

    fn check_transition(&self, id: &str, to: ProposalState) -> Result<ProposalState, GovError> {
        let proposal = self.require(id)?;
        if !proposal.state.can_transition(to) {
            return Err(GovError::InvalidTransition {
                from: proposal.state,
                to,
            });
        }
        Ok(proposal.state)
    }

    fn apply_transition(&mut self, id: &str, to: ProposalState) {
        if let Some(proposal) = self.proposals.get_mut(id) {
            proposal.state = to;
        }
    }
}

fn version_hash(full_text: &str, summary: &str, implications: &[String]) -> String {
    hash_value(&json!({
        "fullText": full_text,
        "implications": implications,
        "summary": summary,
    }))
}

fn transition_payload(id: &str, from: ProposalState, to: ProposalState) -> serde_json::Value {
    json!({
        "from": from.as_str(),
        "proposalId": id,
        "to": to.as_str(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use ProposalState::*;
        assert!(Draft.can_transition(Petition));
        assert!(Draft.can_transition(Open));
        assert!(Petition.can_transition(Open));
        assert!(Petition.can_transition(Expired));
        assert!(Open.can_transition(Voting));
        assert!(Open.can_transition(Expired));
        assert!(Voting.can_transition(Tallying));
        assert!(Tallying.can_transition(Enacted));
        assert!(Tallying.can_transition(Rejected));
        assert!(Enacted.can_transition(Amended));

        assert!(!Draft.can_transition(Voting));
        assert!(!Voting.can_transition(Open));
        assert!(!Rejected.can_transition(Voting));
        assert!(!Enacted.can_transition(Voting));
        assert!(!Expired.can_transition(Open));
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&ProposalState::Tallying).unwrap(),
            "\"TALLYING\""
        );
        assert_eq!(ProposalState::Petition.to_string(), "PETITION");
        let kind: ProposalKind = serde_json::from_str("\"RESOLUTION\"").unwrap();
        assert_eq!(kind, ProposalKind::Resolution);
    }
}

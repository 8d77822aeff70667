//! Commit–reveal voting: per-proposal sessions, tallies, and the ballot
//! Merkle root.
//!
//! A session moves through `COMMIT → REVEAL → TALLY → CLOSED`. During the
//! commit window only hash commitments are visible; a reveal must open the
//! voter's prior commitment exactly or nothing is recorded. The tally
//! counts choices, computes quorum over eligible voters and the pass
//! percentage over non-abstain ballots, and seals every revealed ballot
//! under a Merkle root so third parties can audit the count.
//!
//! # Tally arithmetic
//!
//! Abstentions count toward quorum (they are revealed ballots) but are
//! excluded from the pass-percent denominator. Quorum compares with `≥`;
//! passing requires the YEA share to strictly exceed the threshold, so a
//! tied non-abstain vote fails. Percentages are rounded to two decimals.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::json;

use agora_crypto::{commitment, hash_of, ids, CryptoError, MerkleTree};
use agora_ledger::{now_ms, EntryKind, Ledger, LedgerEntry};

use crate::error::GovError;
use crate::identity::IdentityRegistry;
use crate::proposal::{ProposalRegistry, ProposalState, VotingConfig};

/// Phase of a voting session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotePhase {
    Commit,
    Reveal,
    Tally,
    Closed,
}

/// A ballot choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BallotChoice {
    Yea,
    Nay,
    Abstain,
}

impl BallotChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            BallotChoice::Yea => "YEA",
            BallotChoice::Nay => "NAY",
            BallotChoice::Abstain => "ABSTAIN",
        }
    }

    /// Parse a wire-form choice; anything else is invalid.
    pub fn parse(s: &str) -> Option<BallotChoice> {
        match s {
            "YEA" => Some(BallotChoice::Yea),
            "NAY" => Some(BallotChoice::Nay),
            "ABSTAIN" => Some(BallotChoice::Abstain),
            _ => None,
        }
    }
}

impl std::fmt::Display for BallotChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A revealed vote.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub id: String,
    pub voter_fingerprint: String,
    pub proposal_id: String,
    pub choice: BallotChoice,
    /// The nonce that opened the commitment.
    pub nonce: String,
    pub commitment: String,
    pub revealed: bool,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

/// Choice counts, keyed by wire name in JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyCounts {
    #[serde(rename = "YEA")]
    pub yea: usize,
    #[serde(rename = "NAY")]
    pub nay: usize,
    #[serde(rename = "ABSTAIN")]
    pub abstain: usize,
}

impl TallyCounts {
    pub fn record(&mut self, choice: BallotChoice) {
        match choice {
            BallotChoice::Yea => self.yea += 1,
            BallotChoice::Nay => self.nay += 1,
            BallotChoice::Abstain => self.abstain += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.yea + self.nay + self.abstain
    }
}

/// The outcome of a tally, attached to the proposal and written to the
/// ledger as a system `VOTE_TALLY` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyResult {
    pub proposal_id: String,
    pub counts: TallyCounts,
    pub total_revealed: usize,
    pub eligible_voters: usize,
    /// Revealed share of eligible voters, two-decimal rounded.
    pub turnout_percent: f64,
    pub quorum_met: bool,
    /// YEA share of non-abstain ballots, two-decimal rounded.
    pub pass_percent: f64,
    pub passed: bool,
    /// Root of the Merkle tree over `hash({choice, nonce, voter})` leaves.
    pub ballot_merkle_root: String,
    pub tallied_at: u64,
}

/// A per-proposal commit–reveal session.
#[derive(Clone, Debug)]
pub struct VotingSession {
    pub proposal_id: String,
    pub phase: VotePhase,
    /// voter fingerprint → 64-hex commitment.
    commitments: BTreeMap<String, String>,
    /// voter fingerprint → revealed ballot.
    ballots: BTreeMap<String, Ballot>,
    pub tally_result: Option<TallyResult>,
}

impl VotingSession {
    fn new(proposal_id: String) -> Self {
        VotingSession {
            proposal_id,
            phase: VotePhase::Commit,
            commitments: BTreeMap::new(),
            ballots: BTreeMap::new(),
            tally_result: None,
        }
    }

    pub fn commitments(&self) -> &BTreeMap<String, String> {
        &self.commitments
    }

    pub fn ballots(&self) -> &BTreeMap<String, Ballot> {
        &self.ballots
    }
}

#[derive(Debug, Default)]
pub struct VotingManager {
    sessions: HashMap<String, VotingSession>,
}

impl VotingManager {
    pub fn new() -> Self {
        VotingManager::default()
    }

    pub fn session(&self, proposal_id: &str) -> Option<&VotingSession> {
        self.sessions.get(proposal_id)
    }

    /// Move a proposal `OPEN → VOTING` and open its session in the commit
    /// phase.
    pub fn open_voting(
        &mut self,
        ledger: &mut Ledger,
        proposals: &mut ProposalRegistry,
        proposal_id: &str,
        actor_fp: &str,
        actor_private_pem: &str,
    ) -> Result<(), GovError> {
        if self.sessions.contains_key(proposal_id) {
            return Err(GovError::Duplicate(format!(
                "voting session for proposal {proposal_id} already exists"
            )));
        }
        proposals.transition(
            ledger,
            proposal_id,
            ProposalState::Voting,
            actor_fp,
            actor_private_pem,
        )?;
        self.sessions
            .insert(proposal_id.to_string(), VotingSession::new(proposal_id.to_string()));
        Ok(())
    }

    /// Record a voter's commitment during the commit phase.
    pub fn submit_commitment(
        &mut self,
        ledger: &mut Ledger,
        identities: &IdentityRegistry,
        proposals: &ProposalRegistry,
        proposal_id: &str,
        voter_fp: &str,
        commitment_hex: &str,
        voter_private_pem: &str,
    ) -> Result<(), GovError> {
        let session = self
            .sessions
            .get(proposal_id)
            .ok_or_else(|| GovError::SessionNotFound(proposal_id.to_string()))?;
        if session.phase != VotePhase::Commit {
            return Err(GovError::State(format!(
                "commitments are only accepted in COMMIT, session is {:?}",
                session.phase
            )));
        }

        let voter = identities.require_active(voter_fp)?;
        let proposal = proposals.require(proposal_id)?;
        let filter = proposal
            .voting_config
            .as_ref()
            .and_then(|c| c.eligible_jurisdiction.as_deref());
        if !IdentityRegistry::matches_jurisdiction(voter, filter) {
            return Err(GovError::Auth(format!(
                "voter jurisdiction {} is not eligible for this vote",
                voter.jurisdiction
            )));
        }

        if session.commitments.contains_key(voter_fp) {
            return Err(GovError::Duplicate(format!(
                "{voter_fp} already committed on this proposal"
            )));
        }
        if commitment_hex.len() != 64 || !commitment_hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GovError::Validation(
                "commitment must be 64 hex characters".into(),
            ));
        }

        let entry = LedgerEntry::signed(
            EntryKind::VoteCommit,
            json!({
                "commitment": commitment_hex,
                "proposalId": proposal_id,
            }),
            voter_fp,
            voter_private_pem,
        )?;
        ledger.add_entry(entry)?;

        if let Some(session) = self.sessions.get_mut(proposal_id) {
            session
                .commitments
                .insert(voter_fp.to_string(), commitment_hex.to_string());
        }
        Ok(())
    }

    /// Move the session `COMMIT → REVEAL`.
    pub fn start_reveal(&mut self, proposal_id: &str) -> Result<(), GovError> {
        let session = self
            .sessions
            .get_mut(proposal_id)
            .ok_or_else(|| GovError::SessionNotFound(proposal_id.to_string()))?;
        if session.phase != VotePhase::Commit {
            return Err(GovError::State(format!(
                "reveal phase can only start from COMMIT, session is {:?}",
                session.phase
            )));
        }
        session.phase = VotePhase::Reveal;
        Ok(())
    }

    /// Open a voter's commitment and record their ballot.
    pub fn reveal_vote(
        &mut self,
        ledger: &mut Ledger,
        proposal_id: &str,
        voter_fp: &str,
        choice: BallotChoice,
        nonce: &str,
        voter_private_pem: &str,
    ) -> Result<String, GovError> {
        let session = self
            .sessions
            .get(proposal_id)
            .ok_or_else(|| GovError::SessionNotFound(proposal_id.to_string()))?;
        if session.phase != VotePhase::Reveal {
            return Err(GovError::State(format!(
                "reveals are only accepted in REVEAL, session is {:?}",
                session.phase
            )));
        }
        let stored = session
            .commitments
            .get(voter_fp)
            .ok_or_else(|| GovError::Auth(format!("{voter_fp} never committed on this proposal")))?
            .clone();
        if session.ballots.contains_key(voter_fp) {
            return Err(GovError::Duplicate(format!(
                "{voter_fp} already revealed on this proposal"
            )));
        }
        if !commitment::open(choice.as_str(), nonce, &stored) {
            return Err(GovError::Auth(
                "reveal does not open the stored commitment".into(),
            ));
        }

        let ballot = Ballot {
            id: ids::entry_id(),
            voter_fingerprint: voter_fp.to_string(),
            proposal_id: proposal_id.to_string(),
            choice,
            nonce: nonce.to_string(),
            commitment: stored,
            revealed: true,
            timestamp_ms: now_ms(),
        };

        let entry = LedgerEntry::signed(
            EntryKind::VoteReveal,
            json!({
                "ballotId": ballot.id,
                "choice": choice.as_str(),
                "nonce": nonce,
                "proposalId": proposal_id,
            }),
            voter_fp,
            voter_private_pem,
        )?;
        ledger.add_entry(entry)?;

        let ballot_id = ballot.id.clone();
        if let Some(session) = self.sessions.get_mut(proposal_id) {
            session.ballots.insert(voter_fp.to_string(), ballot);
        }
        Ok(ballot_id)
    }

    /// Count the revealed ballots and close the session.
    ///
    /// Emits a system `VOTE_TALLY` entry with the full result, including
    /// the ballot Merkle root.
    pub fn tally(
        &mut self,
        ledger: &mut Ledger,
        identities: &IdentityRegistry,
        proposals: &ProposalRegistry,
        proposal_id: &str,
    ) -> Result<TallyResult, GovError> {
        let session = self
            .sessions
            .get_mut(proposal_id)
            .ok_or_else(|| GovError::SessionNotFound(proposal_id.to_string()))?;
        if session.phase != VotePhase::Reveal {
            return Err(GovError::State(format!(
                "tally requires REVEAL, session is {:?}",
                session.phase
            )));
        }
        session.phase = VotePhase::Tally;

        let proposal = proposals.require(proposal_id)?;
        let config = proposal.voting_config.clone().unwrap_or_default();

        let mut counts = TallyCounts::default();
        let mut leaves = Vec::with_capacity(session.ballots.len());
        for ballot in session.ballots.values() {
            counts.record(ballot.choice);
            leaves.push(hash_of(&json!({
                "choice": ballot.choice.as_str(),
                "nonce": ballot.nonce,
                "voter": ballot.voter_fingerprint,
            }))?);
        }
        let ballot_merkle_root = MerkleTree::new(leaves).root().to_string();

        let filter = config.eligible_jurisdiction.as_deref();
        let eligible_voters = identities.eligible_count(filter);
        let total_revealed = counts.total();

        let turnout = (total_revealed as f64 / eligible_voters.max(1) as f64) * 100.0;
        let quorum_met = turnout >= config.quorum_percent;
        let decided = counts.yea + counts.nay;
        let pass_percent = if decided == 0 {
            0.0
        } else {
            round2(counts.yea as f64 / decided as f64 * 100.0)
        };
        let passed = quorum_met && pass_percent > config.pass_percent;

        let result = TallyResult {
            proposal_id: proposal_id.to_string(),
            counts,
            total_revealed,
            eligible_voters,
            turnout_percent: round2(turnout),
            quorum_met,
            pass_percent,
            passed,
            ballot_merkle_root,
            tallied_at: now_ms(),
        };

        let payload = serde_json::to_value(&result)
            .map_err(|e| GovError::Crypto(CryptoError::Serialization(e.to_string())))?;
        ledger.add_entry(LedgerEntry::system(EntryKind::VoteTally, payload))?;

        let session = self
            .sessions
            .get_mut(proposal_id)
            .ok_or_else(|| GovError::SessionNotFound(proposal_id.to_string()))?;
        session.phase = VotePhase::Closed;
        session.tally_result = Some(result.clone());
        Ok(result)
    }

    /// Tally and settle the proposal: `VOTING → TALLYING → ENACTED` or
    /// `REJECTED`, with the result attached to the proposal.
    ///
    /// A session still in its commit phase is advanced to reveal first, so
    /// a vote nobody revealed settles as rejected rather than hanging.
    pub fn finalize(
        &mut self,
        ledger: &mut Ledger,
        identities: &IdentityRegistry,
        proposals: &mut ProposalRegistry,
        proposal_id: &str,
        actor_fp: &str,
        actor_private_pem: &str,
    ) -> Result<TallyResult, GovError> {
        let phase = self
            .sessions
            .get(proposal_id)
            .ok_or_else(|| GovError::SessionNotFound(proposal_id.to_string()))?
            .phase;
        match phase {
            VotePhase::Commit => self.start_reveal(proposal_id)?,
            VotePhase::Reveal => {}
            other => {
                return Err(GovError::State(format!(
                    "session already finalized ({other:?})"
                )))
            }
        }

        let result = self.tally(ledger, identities, proposals, proposal_id)?;
        proposals.transition(
            ledger,
            proposal_id,
            ProposalState::Tallying,
            actor_fp,
            actor_private_pem,
        )?;
        let outcome = if result.passed {
            ProposalState::Enacted
        } else {
            ProposalState::Rejected
        };
        proposals.transition_system(ledger, proposal_id, outcome)?;
        proposals.attach_tally(proposal_id, result.clone())?;
        Ok(result)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

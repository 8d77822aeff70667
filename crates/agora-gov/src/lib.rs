//! Governance registries over the agora ledger.
//!
//! Four write-facing components and one read-only surface:
//!
//! - [`identity`]: key-pair registration, challenge–response authentication,
//!   attestations, revocation
//! - [`proposal`]: versioned legislative items and their lifecycle state
//!   machine
//! - [`petition`]: thresholded signature collection with implication
//!   acknowledgement, advancing proposals toward a vote
//! - [`voting`]: per-proposal commit–reveal sessions, tallies, and the
//!   ballot Merkle root
//! - [`audit`]: chain verification, inclusion and signature checks, and
//!   independent re-tallies, all without write access
//!
//! Every mutating operation emits a signed [`agora_ledger::LedgerEntry`]
//! into a ledger the caller owns. Registries never hold each other: an
//! operation that spans components (a petition signature that advances a
//! proposal, a ballot that needs an identity check) borrows the other
//! registries explicitly. The ledger is the only shared handle, which keeps
//! the component graph a tree.
//!
//! # Write serialization
//!
//! Registries are single-owner, synchronous state machines. Inside a
//! concurrent runtime, one logical owner must serialize every write path;
//! the replication node does this with a lock around the ledger.

pub mod audit;
pub mod error;
pub mod identity;
pub mod petition;
pub mod proposal;
pub mod voting;

pub use audit::{
    AuditEngine, ChainIntegrityReport, EntrySummary, InclusionReport, RetallyReport,
    SignatureReport, TransparencyReport,
};
pub use error::GovError;
pub use identity::{Attestation, Identity, IdentityRegistry, IdentityStats, RegistrationRequest};
pub use petition::{
    Petition, PetitionManager, PetitionSignature, PetitionStats, SignatureVerification,
    DEFAULT_PETITION_THRESHOLD,
};
pub use proposal::{
    Proposal, ProposalDraft, ProposalKind, ProposalRegistry, ProposalState, ProposalStats,
    ProposalVersion, VotingConfig,
};
pub use voting::{
    Ballot, BallotChoice, TallyCounts, TallyResult, VotePhase, VotingManager, VotingSession,
};

//! Proposal creation, versioning, and state-machine safety.

use agora_crypto::{generate_keypair, Keypair};
use agora_gov::{
    GovError, IdentityRegistry, ProposalDraft, ProposalKind, ProposalRegistry, ProposalState,
    RegistrationRequest, VotingConfig,
};
use agora_ledger::{EntryKind, Ledger};

struct Fixture {
    ledger: Ledger,
    identities: IdentityRegistry,
    proposals: ProposalRegistry,
    author: Keypair,
    author_fp: String,
}

fn fixture() -> Fixture {
    let mut ledger = Ledger::new();
    let mut identities = IdentityRegistry::new();
    let author = generate_keypair().unwrap();
    let author_fp = identities
        .register(
            &mut ledger,
            RegistrationRequest {
                public_key_pem: author.public_pem.clone(),
                alias: "author".into(),
                jurisdiction: "US-CA".into(),
                private_key_pem: author.private_pem.clone(),
            },
        )
        .unwrap();
    Fixture {
        ledger,
        identities,
        proposals: ProposalRegistry::new(),
        author,
        author_fp,
    }
}

fn draft(f: &Fixture, title: &str) -> ProposalDraft {
    ProposalDraft {
        kind: ProposalKind::Law,
        title: title.to_string(),
        full_text: "Full text of the measure.".into(),
        summary: "A short summary.".into(),
        implications: vec!["Raises the levy.".into()],
        jurisdiction: "US-CA".into(),
        amendment_of: None,
        author_fingerprint: f.author_fp.clone(),
        author_private_key: f.author.private_pem.clone(),
    }
}

#[test]
fn test_create_initializes_first_version() {
    let mut f = fixture();
    let d = draft(&f, "Levy Act");
    let id = f
        .proposals
        .create(&mut f.ledger, &f.identities, d)
        .expect("create");

    let proposal = f.proposals.get(&id).unwrap();
    assert_eq!(proposal.state, ProposalState::Draft);
    assert_eq!(proposal.versions.len(), 1);
    assert_eq!(proposal.versions[0].version, 1);
    assert_eq!(proposal.versions[0].hash.len(), 64);

    f.ledger.commit_block().unwrap();
    assert_eq!(f.ledger.entries_by_kind(EntryKind::ProposalCreate).len(), 1);
}

#[test]
fn test_create_requires_implications_and_author() {
    let mut f = fixture();

    let mut empty = draft(&f, "No consequences");
    empty.implications.clear();
    assert!(matches!(
        f.proposals.create(&mut f.ledger, &f.identities, empty),
        Err(GovError::Validation(_))
    ));

    let stranger = generate_keypair().unwrap();
    let mut unregistered = draft(&f, "Ghost measure");
    unregistered.author_fingerprint = agora_crypto::fingerprint(&stranger.public_pem);
    unregistered.author_private_key = stranger.private_pem.clone();
    assert!(matches!(
        f.proposals.create(&mut f.ledger, &f.identities, unregistered),
        Err(GovError::IdentityNotFound(_))
    ));
}

#[test]
fn test_revoked_author_cannot_create() {
    let mut f = fixture();
    f.identities
        .revoke(&mut f.ledger, &f.author_fp.clone(), &f.author.private_pem)
        .unwrap();
    let d = draft(&f, "Posthumous measure");
    assert!(matches!(
        f.proposals.create(&mut f.ledger, &f.identities, d),
        Err(GovError::Auth(_))
    ));
}

#[test]
fn test_versions_append_and_stay_immutable() {
    let mut f = fixture();
    let __d1 = draft(&f, "Levy Act");
    let id = f
        .proposals
        .create(&mut f.ledger, &f.identities, __d1)
        .unwrap();

    let first_hash = f.proposals.get(&id).unwrap().versions[0].hash.clone();
    let n = f
        .proposals
        .add_version(
            &id,
            "Amended full text.".into(),
            "Amended summary.".into(),
            vec!["Raises the levy.".into(), "Sunsets in five years.".into()],
        )
        .expect("second version");
    assert_eq!(n, 2);

    let proposal = f.proposals.get(&id).unwrap();
    assert_eq!(proposal.versions.len(), 2);
    assert_eq!(proposal.versions[0].hash, first_hash);
    assert_ne!(proposal.versions[1].hash, first_hash);
    assert_eq!(proposal.implications.len(), 2);
}

#[test]
fn test_versioning_locked_outside_draft_and_open() {
    let mut f = fixture();
    let __d2 = draft(&f, "Levy Act");
    let id = f
        .proposals
        .create(&mut f.ledger, &f.identities, __d2)
        .unwrap();
    f.proposals
        .transition(
            &mut f.ledger,
            &id,
            ProposalState::Petition,
            &f.author_fp.clone(),
            &f.author.private_pem.clone(),
        )
        .unwrap();

    assert!(matches!(
        f.proposals
            .add_version(&id, "t".into(), "s".into(), vec!["i".into()]),
        Err(GovError::State(_))
    ));
}

#[test]
fn test_illegal_transition_rejected_without_mutation() {
    let mut f = fixture();
    let __d3 = draft(&f, "Levy Act");
    let id = f
        .proposals
        .create(&mut f.ledger, &f.identities, __d3)
        .unwrap();

    let err = f
        .proposals
        .transition(
            &mut f.ledger,
            &id,
            ProposalState::Voting,
            &f.author_fp.clone(),
            &f.author.private_pem.clone(),
        )
        .expect_err("DRAFT cannot jump to VOTING");
    assert!(matches!(err, GovError::InvalidTransition { .. }));
    assert_eq!(f.proposals.get(&id).unwrap().state, ProposalState::Draft);
    // Nothing was queued for the failed transition.
    assert_eq!(
        f.ledger
            .pending()
            .iter()
            .filter(|e| e.kind == EntryKind::ProposalStateChange)
            .count(),
        0
    );
}

#[test]
fn test_full_lifecycle_emits_state_changes() {
    let mut f = fixture();
    let __d4 = draft(&f, "Levy Act");
    let id = f
        .proposals
        .create(&mut f.ledger, &f.identities, __d4)
        .unwrap();
    let fp = f.author_fp.clone();
    let key = f.author.private_pem.clone();

    for to in [
        ProposalState::Petition,
        ProposalState::Open,
        ProposalState::Voting,
        ProposalState::Tallying,
        ProposalState::Enacted,
        ProposalState::Amended,
    ] {
        f.proposals
            .transition(&mut f.ledger, &id, to, &fp, &key)
            .unwrap_or_else(|e| panic!("transition to {to}: {e}"));
    }
    assert_eq!(f.proposals.get(&id).unwrap().state, ProposalState::Amended);

    f.ledger.commit_block().unwrap();
    assert_eq!(
        f.ledger.entries_by_kind(EntryKind::ProposalStateChange).len(),
        6
    );
}

#[test]
fn test_voting_config_defaults() {
    let mut f = fixture();
    let __d5 = draft(&f, "Levy Act");
    let id = f
        .proposals
        .create(&mut f.ledger, &f.identities, __d5)
        .unwrap();
    f.proposals
        .set_voting_config(&id, VotingConfig::default())
        .unwrap();

    let config = f.proposals.get(&id).unwrap().voting_config.clone().unwrap();
    assert_eq!(config.quorum_percent, 10.0);
    assert_eq!(config.pass_percent, 50.0);
    assert!(config.eligible_jurisdiction.is_none());
}

#[test]
fn test_stats_by_state() {
    let mut f = fixture();
    let __d6 = draft(&f, "A");
    let a = f
        .proposals
        .create(&mut f.ledger, &f.identities, __d6)
        .unwrap();
    let __d7 = draft(&f, "B");
    f.proposals
        .create(&mut f.ledger, &f.identities, __d7)
        .unwrap();
    f.proposals
        .transition(
            &mut f.ledger,
            &a,
            ProposalState::Petition,
            &f.author_fp.clone(),
            &f.author.private_pem.clone(),
        )
        .unwrap();

    let stats = f.proposals.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_state.get("DRAFT"), Some(&1));
    assert_eq!(stats.by_state.get("PETITION"), Some(&1));
    assert_eq!(f.proposals.by_state(ProposalState::Draft).len(), 1);
}

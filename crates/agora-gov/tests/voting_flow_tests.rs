//! Commit–reveal voting: the full happy path, commitment binding, phase
//! safety, and jurisdiction filtering.

use agora_crypto::{commitment, generate_keypair, Keypair};
use agora_gov::{
    BallotChoice, GovError, IdentityRegistry, PetitionManager, ProposalDraft, ProposalKind,
    ProposalRegistry, ProposalState, RegistrationRequest, VotingConfig, VotingManager,
};
use agora_ledger::{EntryKind, Ledger};

struct Member {
    fp: String,
    kp: Keypair,
}

struct Fixture {
    ledger: Ledger,
    identities: IdentityRegistry,
    proposals: ProposalRegistry,
    voting: VotingManager,
    author: Member,
    voters: Vec<Member>,
    proposal_id: String,
}

fn register(
    ledger: &mut Ledger,
    identities: &mut IdentityRegistry,
    alias: &str,
    jurisdiction: &str,
) -> Member {
    let kp = generate_keypair().unwrap();
    let fp = identities
        .register(
            ledger,
            RegistrationRequest {
                public_key_pem: kp.public_pem.clone(),
                alias: alias.to_string(),
                jurisdiction: jurisdiction.to_string(),
                private_key_pem: kp.private_pem.clone(),
            },
        )
        .unwrap();
    Member { fp, kp }
}

/// Author plus `voters` members, all in `jurisdiction`; the proposal has
/// been petitioned through to OPEN by the first five voters.
fn fixture(voters: usize, jurisdiction: &str) -> Fixture {
    assert!(voters >= 5, "fixture petitions with five signers");
    let mut ledger = Ledger::new();
    let mut identities = IdentityRegistry::new();
    let mut proposals = ProposalRegistry::new();
    let mut petitions = PetitionManager::new();

    let author = register(&mut ledger, &mut identities, "author", jurisdiction);
    let members: Vec<Member> = (0..voters)
        .map(|i| register(&mut ledger, &mut identities, &format!("voter-{i}"), jurisdiction))
        .collect();

    let proposal_id = proposals
        .create(
            &mut ledger,
            &identities,
            ProposalDraft {
                kind: ProposalKind::Law,
                title: "Levy Act".into(),
                full_text: "Full text.".into(),
                summary: "Summary.".into(),
                implications: vec![
                    "Raises the levy.".into(),
                    "Creates an oversight board.".into(),
                    "Sunsets in five years.".into(),
                ],
                jurisdiction: jurisdiction.to_string(),
                amendment_of: None,
                author_fingerprint: author.fp.clone(),
                author_private_key: author.kp.private_pem.clone(),
            },
        )
        .unwrap();
    proposals
        .transition(
            &mut ledger,
            &proposal_id,
            ProposalState::Petition,
            &author.fp,
            &author.kp.private_pem,
        )
        .unwrap();
    petitions.create(&proposals, &proposal_id, Some(5)).unwrap();
    for signer in &members[..5] {
        petitions
            .sign(
                &mut ledger,
                &identities,
                &mut proposals,
                &proposal_id,
                &signer.fp,
                &signer.kp.private_pem,
            )
            .unwrap();
    }
    assert_eq!(proposals.get(&proposal_id).unwrap().state, ProposalState::Open);

    Fixture {
        ledger,
        identities,
        proposals,
        voting: VotingManager::new(),
        author,
        voters: members,
        proposal_id,
    }
}

#[test]
fn test_happy_path_vote_enacts_proposal() {
    let mut f = fixture(6, "US-CA");
    f.voting
        .open_voting(
            &mut f.ledger,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();
    assert_eq!(
        f.proposals.get(&f.proposal_id).unwrap().state,
        ProposalState::Voting
    );

    let choices = [
        BallotChoice::Yea,
        BallotChoice::Yea,
        BallotChoice::Yea,
        BallotChoice::Yea,
        BallotChoice::Nay,
        BallotChoice::Nay,
    ];
    let mut nonces = Vec::new();
    for (voter, choice) in f.voters.iter().zip(choices) {
        let (commit, nonce) = commitment::commit_with_fresh_nonce(choice.as_str());
        f.voting
            .submit_commitment(
                &mut f.ledger,
                &f.identities,
                &f.proposals,
                &f.proposal_id,
                &voter.fp,
                &commit,
                &voter.kp.private_pem,
            )
            .unwrap();
        nonces.push(nonce);
    }

    f.voting.start_reveal(&f.proposal_id).unwrap();
    for ((voter, choice), nonce) in f.voters.iter().zip(choices).zip(&nonces) {
        f.voting
            .reveal_vote(
                &mut f.ledger,
                &f.proposal_id,
                &voter.fp,
                choice,
                nonce,
                &voter.kp.private_pem,
            )
            .unwrap();
    }

    let result = f
        .voting
        .finalize(
            &mut f.ledger,
            &f.identities,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    assert_eq!(result.counts.yea, 4);
    assert_eq!(result.counts.nay, 2);
    assert_eq!(result.counts.abstain, 0);
    assert_eq!(result.total_revealed, 6);
    assert_eq!(result.pass_percent, 66.67);
    assert!(result.quorum_met);
    assert!(result.passed);
    assert_eq!(result.ballot_merkle_root.len(), 64);
    assert!(result
        .ballot_merkle_root
        .chars()
        .all(|c| c.is_ascii_hexdigit()));

    let proposal = f.proposals.get(&f.proposal_id).unwrap();
    assert_eq!(proposal.state, ProposalState::Enacted);
    assert_eq!(proposal.tally_result.as_ref().unwrap().counts.yea, 4);

    f.ledger.commit_block().unwrap();
    assert_eq!(f.ledger.entries_by_kind(EntryKind::VoteCommit).len(), 6);
    assert_eq!(f.ledger.entries_by_kind(EntryKind::VoteReveal).len(), 6);
    let tallies = f.ledger.entries_by_kind(EntryKind::VoteTally);
    assert_eq!(tallies.len(), 1);
    assert!(tallies[0].is_system());
    assert_eq!(tallies[0].payload["ballotMerkleRoot"], result.ballot_merkle_root);
}

#[test]
fn test_mismatched_reveal_rejected_and_unrecorded() {
    let mut f = fixture(5, "US-CA");
    f.voting
        .open_voting(
            &mut f.ledger,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    let voter = &f.voters[0];
    let (commit, nonce) = commitment::commit_with_fresh_nonce("YEA");
    f.voting
        .submit_commitment(
            &mut f.ledger,
            &f.identities,
            &f.proposals,
            &f.proposal_id,
            &voter.fp,
            &commit,
            &voter.kp.private_pem,
        )
        .unwrap();
    f.voting.start_reveal(&f.proposal_id).unwrap();

    // Committed to YEA, tries to reveal NAY under the same nonce.
    let err = f
        .voting
        .reveal_vote(
            &mut f.ledger,
            &f.proposal_id,
            &voter.fp,
            BallotChoice::Nay,
            &nonce,
            &voter.kp.private_pem,
        )
        .expect_err("reveal must not open");
    assert!(matches!(err, GovError::Auth(_)));
    assert!(f
        .voting
        .session(&f.proposal_id)
        .unwrap()
        .ballots()
        .is_empty());

    // The honest reveal still goes through.
    f.voting
        .reveal_vote(
            &mut f.ledger,
            &f.proposal_id,
            &voter.fp,
            BallotChoice::Yea,
            &nonce,
            &voter.kp.private_pem,
        )
        .unwrap();
}

#[test]
fn test_jurisdiction_filter_at_commit() {
    let mut f = fixture(5, "US-CA");
    let outsider = register(&mut f.ledger, &mut f.identities, "outsider", "US-NY");
    f.proposals
        .set_voting_config(
            &f.proposal_id,
            VotingConfig {
                eligible_jurisdiction: Some("US-CA".into()),
                ..VotingConfig::default()
            },
        )
        .unwrap();
    f.voting
        .open_voting(
            &mut f.ledger,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    let (commit, _) = commitment::commit_with_fresh_nonce("YEA");
    let err = f
        .voting
        .submit_commitment(
            &mut f.ledger,
            &f.identities,
            &f.proposals,
            &f.proposal_id,
            &outsider.fp,
            &commit,
            &outsider.kp.private_pem,
        )
        .expect_err("US-NY voter in a US-CA vote");
    assert!(matches!(err, GovError::Auth(_)));

    // In-jurisdiction voters pass the same gate.
    let local = &f.voters[0];
    let (commit, _) = commitment::commit_with_fresh_nonce("YEA");
    f.voting
        .submit_commitment(
            &mut f.ledger,
            &f.identities,
            &f.proposals,
            &f.proposal_id,
            &local.fp,
            &commit,
            &local.kp.private_pem,
        )
        .unwrap();
}

#[test]
fn test_global_config_admits_any_jurisdiction() {
    let mut f = fixture(5, "US-CA");
    let outsider = register(&mut f.ledger, &mut f.identities, "outsider", "US-NY");
    f.proposals
        .set_voting_config(
            &f.proposal_id,
            VotingConfig {
                eligible_jurisdiction: Some("global".into()),
                ..VotingConfig::default()
            },
        )
        .unwrap();
    f.voting
        .open_voting(
            &mut f.ledger,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    let (commit, _) = commitment::commit_with_fresh_nonce("YEA");
    f.voting
        .submit_commitment(
            &mut f.ledger,
            &f.identities,
            &f.proposals,
            &f.proposal_id,
            &outsider.fp,
            &commit,
            &outsider.kp.private_pem,
        )
        .expect("global admits everyone");
}

#[test]
fn test_double_commit_rejected() {
    let mut f = fixture(5, "US-CA");
    f.voting
        .open_voting(
            &mut f.ledger,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    let voter = &f.voters[0];
    let (commit, _) = commitment::commit_with_fresh_nonce("YEA");
    f.voting
        .submit_commitment(
            &mut f.ledger,
            &f.identities,
            &f.proposals,
            &f.proposal_id,
            &voter.fp,
            &commit,
            &voter.kp.private_pem,
        )
        .unwrap();

    let (second, _) = commitment::commit_with_fresh_nonce("NAY");
    assert!(matches!(
        f.voting.submit_commitment(
            &mut f.ledger,
            &f.identities,
            &f.proposals,
            &f.proposal_id,
            &voter.fp,
            &second,
            &voter.kp.private_pem,
        ),
        Err(GovError::Duplicate(_))
    ));
}

#[test]
fn test_phase_machine_is_exclusive() {
    let mut f = fixture(5, "US-CA");
    f.voting
        .open_voting(
            &mut f.ledger,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    let voter = &f.voters[0];
    // Reveals are refused during COMMIT.
    assert!(matches!(
        f.voting.reveal_vote(
            &mut f.ledger,
            &f.proposal_id,
            &voter.fp,
            BallotChoice::Yea,
            "00",
            &voter.kp.private_pem,
        ),
        Err(GovError::State(_))
    ));

    f.voting.start_reveal(&f.proposal_id).unwrap();
    // Commits are refused during REVEAL, and REVEAL cannot start twice.
    let (commit, _) = commitment::commit_with_fresh_nonce("YEA");
    assert!(matches!(
        f.voting.submit_commitment(
            &mut f.ledger,
            &f.identities,
            &f.proposals,
            &f.proposal_id,
            &voter.fp,
            &commit,
            &voter.kp.private_pem,
        ),
        Err(GovError::State(_))
    ));
    assert!(matches!(
        f.voting.start_reveal(&f.proposal_id),
        Err(GovError::State(_))
    ));
}

#[test]
fn test_reveal_without_commitment_rejected() {
    let mut f = fixture(5, "US-CA");
    f.voting
        .open_voting(
            &mut f.ledger,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();
    f.voting.start_reveal(&f.proposal_id).unwrap();

    let voter = &f.voters[0];
    assert!(matches!(
        f.voting.reveal_vote(
            &mut f.ledger,
            &f.proposal_id,
            &voter.fp,
            BallotChoice::Yea,
            "00",
            &voter.kp.private_pem,
        ),
        Err(GovError::Auth(_))
    ));
}

#[test]
fn test_tie_does_not_pass() {
    let mut f = fixture(6, "US-CA");
    f.voting
        .open_voting(
            &mut f.ledger,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    let choices = [
        BallotChoice::Yea,
        BallotChoice::Yea,
        BallotChoice::Nay,
        BallotChoice::Nay,
        BallotChoice::Abstain,
        BallotChoice::Abstain,
    ];
    let mut nonces = Vec::new();
    for (voter, choice) in f.voters.iter().zip(choices) {
        let (commit, nonce) = commitment::commit_with_fresh_nonce(choice.as_str());
        f.voting
            .submit_commitment(
                &mut f.ledger,
                &f.identities,
                &f.proposals,
                &f.proposal_id,
                &voter.fp,
                &commit,
                &voter.kp.private_pem,
            )
            .unwrap();
        nonces.push(nonce);
    }
    f.voting.start_reveal(&f.proposal_id).unwrap();
    for ((voter, choice), nonce) in f.voters.iter().zip(choices).zip(&nonces) {
        f.voting
            .reveal_vote(
                &mut f.ledger,
                &f.proposal_id,
                &voter.fp,
                choice,
                nonce,
                &voter.kp.private_pem,
            )
            .unwrap();
    }

    let result = f
        .voting
        .finalize(
            &mut f.ledger,
            &f.identities,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    // 2–2 among non-abstain: 50% is not strictly greater than 50%.
    assert!(result.quorum_met);
    assert_eq!(result.pass_percent, 50.0);
    assert!(!result.passed);
    // Abstentions still counted toward quorum.
    assert_eq!(result.total_revealed, 6);
    assert_eq!(
        f.proposals.get(&f.proposal_id).unwrap().state,
        ProposalState::Rejected
    );
}

#[test]
fn test_quorum_failure_rejects() {
    // 5 voters petition, but quorum demands more reveals than arrive.
    let mut f = fixture(5, "US-CA");
    f.proposals
        .set_voting_config(
            &f.proposal_id,
            VotingConfig {
                quorum_percent: 90.0,
                ..VotingConfig::default()
            },
        )
        .unwrap();
    f.voting
        .open_voting(
            &mut f.ledger,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    let voter = &f.voters[0];
    let (commit, nonce) = commitment::commit_with_fresh_nonce("YEA");
    f.voting
        .submit_commitment(
            &mut f.ledger,
            &f.identities,
            &f.proposals,
            &f.proposal_id,
            &voter.fp,
            &commit,
            &voter.kp.private_pem,
        )
        .unwrap();
    f.voting.start_reveal(&f.proposal_id).unwrap();
    f.voting
        .reveal_vote(
            &mut f.ledger,
            &f.proposal_id,
            &voter.fp,
            BallotChoice::Yea,
            &nonce,
            &voter.kp.private_pem,
        )
        .unwrap();

    let result = f
        .voting
        .finalize(
            &mut f.ledger,
            &f.identities,
            &mut f.proposals,
            &f.proposal_id,
            &f.author.fp,
            &f.author.kp.private_pem,
        )
        .unwrap();

    // 1 of 6 eligible (author included) is under the 90% quorum.
    assert!(!result.quorum_met);
    assert!(!result.passed);
    assert_eq!(result.pass_percent, 100.0);
    assert_eq!(
        f.proposals.get(&f.proposal_id).unwrap().state,
        ProposalState::Rejected
    );
}

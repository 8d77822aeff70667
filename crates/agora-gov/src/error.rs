use thiserror::Error;

use agora_crypto::CryptoError;
use agora_ledger::LedgerError;

use crate::proposal::ProposalState;

/// Errors from the governance registries.
///
/// The variants follow the design taxonomy: not-found, duplicate, state,
/// authorization, and validation failures, plus pass-through from the
/// ledger and crypto layers.
#[derive(Debug, Error)]
pub enum GovError {
    #[error("identity {0} is not registered")]
    IdentityNotFound(String),

    #[error("proposal {0} not found")]
    ProposalNotFound(String),

    #[error("no petition exists for proposal {0}")]
    PetitionNotFound(String),

    #[error("no voting session exists for proposal {0}")]
    SessionNotFound(String),

    #[error("ledger entry {0} not found")]
    EntryNotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("proposal cannot move from {from} to {to}")]
    InvalidTransition {
        from: ProposalState,
        to: ProposalState,
    },

    #[error("invalid state: {0}")]
    State(String),

    #[error("not authorized: {0}")]
    Auth(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

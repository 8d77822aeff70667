use thiserror::Error;

/// Errors surfaced by the replication node's public API.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Net(#[from] agora_net::NetError),

    #[error("node is not listening")]
    NotStarted,
}

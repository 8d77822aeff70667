use thiserror::Error;

/// Errors from message encoding. Decoding never errors — malformed input
/// is dropped by design.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("message serialization failed: {0}")]
    Serialize(String),
}

use thiserror::Error;

/// Errors from key handling, signing, and serialization.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A PEM-encoded key failed to parse or encode.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// A signature was malformed beyond repair (verification failures on
    /// well-formed signatures return `false`, not this error).
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    /// A value could not be serialized for hashing or signing.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

//! Wire protocol for ledger replication.
//!
//! Peers exchange UTF-8 JSON objects separated by `\n` over a plain byte
//! stream. Each object carries a single `type` discriminator
//! ([`PeerMessage`]); a reader accumulates bytes until a newline, parses
//! the preceding text, and silently discards malformed lines rather than
//! killing the connection. Transport security is delegated to the
//! operator; there is no TLS at this layer.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{decode_line, encode_message, LineAssembler, MAX_LINE_BYTES};
pub use error::NetError;
pub use message::{PeerMessage, DEFAULT_REPLICATION_PORT};

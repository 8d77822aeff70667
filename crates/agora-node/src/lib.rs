//! The replication node: keeps ledger copies consistent across peers.
//!
//! Each node owns a [`agora_ledger::Ledger`] behind a lock, listens for
//! TCP connections, and speaks the newline-delimited JSON protocol from
//! `agora-net`. Replication is longest-valid-chain: a full chain received
//! in response to `REQUEST_CHAIN` replaces the local one only when it
//! verifies and is strictly longer. Gossiped blocks and entries are
//! re-verified before they touch local state; a peer's word is never
//! taken for a hash.
//!
//! # Task model
//!
//! One accept loop, and per connection one reader task plus one writer
//! task joined by an mpsc channel. All ledger access goes through a
//! `parking_lot::RwLock` held only for synchronous critical sections —
//! never across an await point.

pub mod config;
pub mod error;
pub mod node;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::{NodeEvent, ReplicationNode};

//! Peer message kinds.

use serde::{Deserialize, Serialize};

use agora_ledger::{Block, LedgerEntry, LedgerExport};

/// Default listen port for replication nodes.
pub const DEFAULT_REPLICATION_PORT: u16 = 4000;

/// Everything a peer can say, discriminated by the `type` field.
///
/// `HANDSHAKE` opens a connection in either direction; `REQUEST_CHAIN` /
/// `CHAIN_RESPONSE` implement full sync under the longest-valid-chain
/// rule; `NEW_BLOCK` and `NEW_ENTRY` are gossip; `REQUEST_PEERS` /
/// `PEER_LIST` carry `host:port` strings for discovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    #[serde(rename_all = "camelCase")]
    Handshake { node_id: String, port: u16 },
    RequestChain,
    ChainResponse { ledger: LedgerExport },
    NewBlock { block: Block },
    NewEntry { entry: LedgerEntry },
    RequestPeers,
    PeerList { peers: Vec<String> },
}

//! Node configuration.

use agora_crypto::ids;
use agora_net::DEFAULT_REPLICATION_PORT;

/// Configuration for a [`crate::ReplicationNode`].
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Stable identifier announced in handshakes.
    pub node_id: String,
    /// Address to listen on. Port 0 lets the OS pick (used in tests).
    pub listen_addr: String,
    /// The port peers should dial back, announced in handshakes. When the
    /// listener binds port 0 the actual port is announced instead.
    pub advertised_port: u16,
    /// Inbound connections beyond this are refused.
    pub max_peers: usize,
    /// Buffer size of the node event channel.
    pub event_buffer: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            node_id: ids::entry_id(),
            listen_addr: format!("0.0.0.0:{DEFAULT_REPLICATION_PORT}"),
            advertised_port: DEFAULT_REPLICATION_PORT,
            max_peers: 64,
            event_buffer: 256,
        }
    }
}

impl NodeConfig {
    /// Config for a test node: loopback, OS-assigned port.
    pub fn ephemeral(node_id: impl Into<String>) -> Self {
        NodeConfig {
            node_id: node_id.into(),
            listen_addr: "127.0.0.1:0".into(),
            advertised_port: 0,
            ..NodeConfig::default()
        }
    }
}

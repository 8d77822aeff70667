//! The replication node runtime: listener, per-peer tasks, and the
//! message handlers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use agora_ledger::{Block, Ledger, LedgerEntry, LedgerExport};
use agora_net::{decode_line, encode_message, LineAssembler, PeerMessage};

use crate::config::NodeConfig;
use crate::error::NodeError;

/// Observable node lifecycle events, published on the channel returned by
/// [`ReplicationNode::new`].
#[derive(Clone, Debug, PartialEq)]
pub enum NodeEvent {
    PeerConnected { node_id: String },
    PeerDisconnected { node_id: String },
    /// A strictly longer valid chain replaced the local one.
    ChainAdopted { old_len: usize, new_len: usize },
    /// A received chain was invalid or not longer; the local chain stands.
    ChainRejected { reason: String },
    /// A gossiped block extended the local chain.
    BlockAppended { index: u64 },
    BlockRejected { reason: String },
    /// A gossiped entry joined the local pending queue.
    EntryQueued { entry_id: String },
    EntryRejected { reason: String },
    PeerListReceived { peers: Vec<String> },
}

struct PeerHandle {
    /// `host:port` the peer can be dialed back on.
    addr: String,
    tx: mpsc::Sender<PeerMessage>,
}

struct NodeInner {
    config: NodeConfig,
    ledger: Arc<RwLock<Ledger>>,
    peers: RwLock<HashMap<String, PeerHandle>>,
    /// Actual bound port, once listening.
    listen_port: RwLock<Option<u16>>,
    events: mpsc::Sender<NodeEvent>,
}

/// A peer in the replication network. Cheap to clone; all clones share the
/// same ledger and peer map.
#[derive(Clone)]
pub struct ReplicationNode {
    inner: Arc<NodeInner>,
}

impl ReplicationNode {
    /// Wrap a ledger in a node. The returned receiver observes
    /// [`NodeEvent`]s; dropping it is fine, events are then discarded.
    pub fn new(config: NodeConfig, ledger: Ledger) -> (Self, mpsc::Receiver<NodeEvent>) {
        let (events, rx) = mpsc::channel(config.event_buffer.max(1));
        let node = ReplicationNode {
            inner: Arc::new(NodeInner {
                config,
                ledger: Arc::new(RwLock::new(ledger)),
                peers: RwLock::new(HashMap::new()),
                listen_port: RwLock::new(None),
                events,
            }),
        };
        (node, rx)
    }

    pub fn node_id(&self) -> &str {
        &self.inner.config.node_id
    }

    /// Shared handle to the node's ledger. Callers producing local writes
    /// (new entries, block commits) go through this lock.
    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        Arc::clone(&self.inner.ledger)
    }

    pub fn chain_len(&self) -> usize {
        self.inner.ledger.read().chain_len()
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.read().len()
    }

    /// Known peers as `(node_id, host:port)` pairs.
    pub fn peers(&self) -> Vec<(String, String)> {
        self.inner
            .peers
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.addr.clone()))
            .collect()
    }

    /// Bind the listener and spawn the accept loop. Returns the bound
    /// address (useful when the config asked for port 0).
    pub async fn start(&self) -> Result<SocketAddr, NodeError> {
        let listener = TcpListener::bind(&self.inner.config.listen_addr).await?;
        let addr = listener.local_addr()?;
        *self.inner.listen_port.write() = Some(addr.port());
        info!(node = %self.node_id(), %addr, "replication node listening");

        let node = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote)) => {
                        if node.peer_count() >= node.inner.config.max_peers {
                            warn!(%remote, "peer limit reached, refusing connection");
                            continue;
                        }
                        debug!(%remote, "inbound connection");
                        node.clone().spawn_connection(stream, false);
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                }
            }
        });
        Ok(addr)
    }

    /// Dial a peer and open with our handshake.
    pub async fn connect(&self, addr: &str) -> Result<(), NodeError> {
        let stream = TcpStream::connect(addr).await?;
        debug!(node = %self.node_id(), %addr, "outbound connection");
        self.clone().spawn_connection(stream, true);
        Ok(())
    }

    /// Ask every connected peer for its full chain.
    pub async fn request_chain(&self) {
        self.broadcast(PeerMessage::RequestChain).await;
    }

    /// Ask every connected peer for its peer list.
    pub async fn request_peers(&self) {
        self.broadcast(PeerMessage::RequestPeers).await;
    }

    /// Gossip a freshly committed block.
    pub async fn broadcast_block(&self, block: Block) {
        self.broadcast(PeerMessage::NewBlock { block }).await;
    }

    /// Gossip a new pending entry.
    pub async fn broadcast_entry(&self, entry: LedgerEntry) {
        self.broadcast(PeerMessage::NewEntry { entry }).await;
    }

    async fn broadcast(&self, message: PeerMessage) {
        let txs: Vec<mpsc::Sender<PeerMessage>> = self
            .inner
            .peers
            .read()
            .values()
            .map(|p| p.tx.clone())
            .collect();
        for tx in txs {
            let _ = tx.send(message.clone()).await;
        }
    }

    fn spawn_connection(self, stream: TcpStream, initiator: bool) {
        tokio::spawn(async move {
            self.run_connection(stream, initiator).await;
        });
    }

    async fn run_connection(self, stream: TcpStream, initiator: bool) {
        let remote_ip = stream
            .peer_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|_| "unknown".into());
        let (mut reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel::<PeerMessage>(64);
        tokio::spawn(write_loop(writer, rx));

        if initiator {
            let _ = tx.send(self.handshake_message()).await;
        }
        let mut sent_handshake = initiator;
        let mut peer_id: Option<String> = None;
        let mut assembler = LineAssembler::new();
        let mut buf = [0u8; 8192];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "read failed, closing connection");
                    break;
                }
            };
            for line in assembler.push(&buf[..n]) {
                let Some(message) = decode_line(&line) else {
                    debug!("dropping malformed line");
                    continue;
                };
                self.dispatch(message, &tx, &remote_ip, &mut sent_handshake, &mut peer_id)
                    .await;
            }
        }

        if let Some(id) = peer_id {
            self.inner.peers.write().remove(&id);
            info!(peer = %id, "peer disconnected");
            self.emit(NodeEvent::PeerDisconnected { node_id: id }).await;
        }
    }

    async fn dispatch(
        &self,
        message: PeerMessage,
        tx: &mpsc::Sender<PeerMessage>,
        remote_ip: &str,
        sent_handshake: &mut bool,
        peer_id: &mut Option<String>,
    ) {
        match message {
            PeerMessage::Handshake { node_id, port } => {
                let addr = format!("{remote_ip}:{port}");
                self.inner.peers.write().insert(
                    node_id.clone(),
                    PeerHandle {
                        addr,
                        tx: tx.clone(),
                    },
                );
                info!(node = %self.node_id(), peer = %node_id, "peer connected");
                if !*sent_handshake {
                    *sent_handshake = true;
                    let _ = tx.send(self.handshake_message()).await;
                }
                *peer_id = Some(node_id.clone());
                self.emit(NodeEvent::PeerConnected { node_id }).await;
            }
            PeerMessage::RequestChain => {
                let export = self.inner.ledger.read().export();
                let _ = tx.send(PeerMessage::ChainResponse { ledger: export }).await;
            }
            PeerMessage::ChainResponse { ledger } => {
                self.consider_chain(ledger).await;
            }
            PeerMessage::NewBlock { block } => {
                let index = block.index;
                let result = self.inner.ledger.write().append_block(block);
                match result {
                    Ok(()) => {
                        debug!(node = %self.node_id(), index, "gossiped block appended");
                        self.emit(NodeEvent::BlockAppended { index }).await;
                    }
                    Err(e) => {
                        debug!(node = %self.node_id(), index, error = %e, "gossiped block dropped");
                        self.emit(NodeEvent::BlockRejected {
                            reason: e.to_string(),
                        })
                        .await;
                    }
                }
            }
            PeerMessage::NewEntry { entry } => {
                let entry_id = entry.id.clone();
                let result = self.inner.ledger.write().add_entry(entry);
                match result {
                    Ok(()) => {
                        debug!(node = %self.node_id(), entry = %entry_id, "gossiped entry queued");
                        self.emit(NodeEvent::EntryQueued { entry_id }).await;
                    }
                    Err(e) => {
                        debug!(node = %self.node_id(), entry = %entry_id, error = %e, "gossiped entry dropped");
                        self.emit(NodeEvent::EntryRejected {
                            reason: e.to_string(),
                        })
                        .await;
                    }
                }
            }
            PeerMessage::RequestPeers => {
                let peers: Vec<String> = self
                    .inner
                    .peers
                    .read()
                    .values()
                    .map(|p| p.addr.clone())
                    .collect();
                let _ = tx.send(PeerMessage::PeerList { peers }).await;
            }
            PeerMessage::PeerList { peers } => {
                debug!(count = peers.len(), "received peer list");
                self.emit(NodeEvent::PeerListReceived { peers }).await;
            }
        }
    }

    /// Longest-valid-chain rule: adopt only a chain that verifies and is
    /// strictly longer than ours.
    async fn consider_chain(&self, export: LedgerExport) {
        let candidate_len = export.chain.len();
        let candidate = match Ledger::from_export(export) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(node = %self.node_id(), error = %e, "chain response failed to import");
                self.emit(NodeEvent::ChainRejected {
                    reason: e.to_string(),
                })
                .await;
                return;
            }
        };
        if let Err(fault) = candidate.verify_chain() {
            warn!(node = %self.node_id(), error = %fault, "chain response failed verification");
            self.emit(NodeEvent::ChainRejected {
                reason: fault.to_string(),
            })
            .await;
            return;
        }

        let adopted = {
            let mut ledger = self.inner.ledger.write();
            let old_len = ledger.chain_len();
            if candidate_len > old_len {
                *ledger = candidate;
                Some((old_len, candidate_len))
            } else {
                None
            }
        };
        match adopted {
            Some((old_len, new_len)) => {
                info!(node = %self.node_id(), old_len, new_len, "adopted longer chain");
                self.emit(NodeEvent::ChainAdopted { old_len, new_len }).await;
            }
            None => {
                debug!(node = %self.node_id(), candidate_len, "chain not longer than local, ignoring");
                self.emit(NodeEvent::ChainRejected {
                    reason: "not strictly longer than local chain".into(),
                })
                .await;
            }
        }
    }

    fn handshake_message(&self) -> PeerMessage {
        let port = self
            .inner
            .listen_port
            .read()
            .unwrap_or(self.inner.config.advertised_port);
        PeerMessage::Handshake {
            node_id: self.inner.config.node_id.clone(),
            port,
        }
    }

    async fn emit(&self, event: NodeEvent) {
        let _ = self.inner.events.send(event).await;
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<PeerMessage>) {
    while let Some(message) = rx.recv().await {
        let Ok(line) = encode_message(&message) else {
            continue;
        };
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
}

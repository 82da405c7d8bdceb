//! Peer Links
//!
//! Connections between published nodes. Each link is one TCP connection that
//! carries frames in both directions once the handshake has succeeded:
//!
//! ```text
//! dialer                         listener
//!   | --- Hello{node, cookie} ---> |   cookie and name checked
//!   | <-- Welcome{node} ---------- |   or Rejected{reason}, then close
//!   | <========= Send ==========> |
//! ```
//!
//! After the handshake the connection is split. A writer task drains the
//! link's outbound queue so `Node::send` never waits on the socket, and a
//! reader task hands every inbound `Send` frame to local delivery. Handshake
//! frames are capped at `WireFormat::MAX_HANDSHAKE_FRAME_SIZE`; the full frame
//! size only opens up once the peer is attached. A frame whose body fails to
//! decode is dropped on its own. When either side of the socket fails, or the
//! stream loses its frame boundary, the link is dropped from the peer table.

use crate::node::Node;
use crate::{NodeError, Result};
use network::{
    Destination, FrameReader, FrameWriter, Frame, TcpConnection, TransportError, WireFormat,
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_HANDSHAKE_TIMEOUT_SECS,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use types::{Atom, Term};

pub(crate) const REJECT_COOKIE: &str = "invalid cookie";
pub(crate) const REJECT_DUPLICATE: &str = "node already connected";

fn handshake_timeout() -> Duration {
    Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS)
}

/// Established connection to one peer node
#[derive(Debug, Clone)]
pub(crate) struct PeerLink {
    id: u64,
    node: Atom,
    outbound: mpsc::UnboundedSender<Frame>,
}

impl PeerLink {
    /// Queue a message for the peer
    pub(crate) fn send(&self, to: Destination, message: Term) -> Result<()> {
        self.outbound
            .send(Frame::Send { to, message })
            .map_err(|_| NodeError::NotConnected {
                node: self.node.clone(),
            })
    }
}

/// Established links by peer node name
#[derive(Debug, Default)]
pub(crate) struct PeerTable {
    links: RwLock<HashMap<Atom, PeerLink>>,
    next_id: AtomicU64,
}

impl PeerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, node: &Atom) -> Option<PeerLink> {
        self.links.read().get(node).cloned()
    }

    pub(crate) fn contains(&self, node: &Atom) -> bool {
        self.links.read().contains_key(node)
    }

    /// Add a link unless the peer is already connected
    fn insert(&self, link: PeerLink) -> bool {
        let mut links = self.links.write();
        if links.contains_key(&link.node) {
            return false;
        }
        links.insert(link.node.clone(), link);
        true
    }

    /// Drop the link for `node`, but only if it is still the link `id`
    fn remove_link(&self, node: &Atom, id: u64) -> bool {
        let mut links = self.links.write();
        match links.get(node) {
            Some(link) if link.id == id => {
                links.remove(node);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn nodes(&self) -> Vec<Atom> {
        self.links.read().keys().cloned().collect()
    }

    pub(crate) fn clear(&self) {
        self.links.write().clear();
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Accept inbound peers until the task is aborted
pub(crate) async fn accept_loop(node: Node, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(peer = %addr, "Accepted inbound connection");
                let node_for_task = node.clone();
                let handle = tokio::spawn(async move {
                    let connection = match TcpConnection::new(stream) {
                        Ok(connection) => connection,
                        Err(e) => {
                            warn!(peer = %addr, error = %e, "Failed to set up inbound connection");
                            return;
                        }
                    };
                    if let Err(e) = accept_peer(&node_for_task, connection).await {
                        warn!(peer = %addr, error = %e, "Inbound handshake failed");
                    }
                });
                node.track_connection_task(handle);
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Listener side of the handshake
async fn accept_peer(node: &Node, mut connection: TcpConnection) -> Result<()> {
    let addr = connection.peer_addr();
    let (peer, cookie) = match connection.expect_frame(handshake_timeout()).await? {
        Frame::Hello { node: peer, cookie } => (peer, cookie),
        other => {
            return Err(TransportError::protocol(format!(
                "Expected hello from {}, got {}",
                addr,
                other.kind()
            ))
            .into())
        }
    };

    let rejection = if cookie != node.cookie() {
        Some(REJECT_COOKIE)
    } else if &peer == node.name() || node.peers().contains(&peer) {
        Some(REJECT_DUPLICATE)
    } else {
        None
    };

    if let Some(reason) = rejection {
        let frame = Frame::Rejected {
            reason: reason.to_string(),
        };
        if let Err(e) = connection.write_frame(&frame).await {
            debug!(peer = %peer, error = %e, "Failed to send rejection");
        }
        return Err(TransportError::handshake(peer.as_str(), reason).into());
    }

    connection
        .write_frame(&Frame::Welcome {
            node: node.name().clone(),
        })
        .await?;

    attach(node, connection, peer)
}

/// Dialer side of the handshake
pub(crate) async fn dial_peer(node: &Node, addr: SocketAddr) -> Result<Atom> {
    let mut connection =
        TcpConnection::connect(addr, Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS)).await?;

    connection
        .write_frame(&Frame::Hello {
            node: node.name().clone(),
            cookie: node.cookie().to_string(),
        })
        .await?;

    let peer = match connection.expect_frame(handshake_timeout()).await? {
        Frame::Welcome { node: peer } => peer,
        Frame::Rejected { reason } => {
            return Err(TransportError::handshake(addr.to_string(), reason).into())
        }
        other => {
            return Err(TransportError::protocol(format!(
                "Expected welcome from {}, got {}",
                addr,
                other.kind()
            ))
            .into())
        }
    };

    attach(node, connection, peer.clone())?;
    Ok(peer)
}

/// Register the link and start its reader and writer tasks
fn attach(node: &Node, connection: TcpConnection, peer: Atom) -> Result<()> {
    let addr = connection.peer_addr();
    let (outbound, queue) = mpsc::unbounded_channel();
    let link = PeerLink {
        id: node.peers().next_id(),
        node: peer.clone(),
        outbound,
    };
    let id = link.id;

    if !node.peers().insert(link) {
        return Err(TransportError::handshake(peer.as_str(), REJECT_DUPLICATE).into());
    }

    let (mut reader, writer) = connection.into_split();
    reader.set_max_frame_size(WireFormat::MAX_FRAME_SIZE);
    node.track_connection_task(tokio::spawn(write_loop(writer, queue, peer.clone())));
    node.track_connection_task(tokio::spawn(read_loop(node.clone(), reader, peer.clone(), id)));

    info!(node = %node.name(), peer = %peer, address = %addr, "Peer connected");
    Ok(())
}

async fn write_loop(mut writer: FrameWriter, mut queue: mpsc::UnboundedReceiver<Frame>, peer: Atom) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = writer.write_frame(&frame).await {
            warn!(peer = %peer, error = %e, "Failed to write to peer");
            break;
        }
    }
    writer.shutdown().await;
}

async fn read_loop(node: Node, mut reader: FrameReader, peer: Atom, id: u64) {
    loop {
        match reader.read_frame().await {
            Ok(Some(Frame::Send { to, message })) => deliver_inbound(&node, &peer, to, message),
            Ok(Some(other)) => {
                warn!(peer = %peer, kind = other.kind(), "Unexpected frame after handshake");
            }
            Ok(None) => {
                debug!(peer = %peer, "Peer closed the connection");
                break;
            }
            Err(e) if reader.is_aligned() => {
                warn!(peer = %peer, error = %e, "Dropping undecodable frame");
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to read from peer");
                break;
            }
        }
    }

    if node.peers().remove_link(&peer, id) {
        info!(node = %node.name(), peer = %peer, "Peer disconnected");
    }
}

fn deliver_inbound(node: &Node, peer: &Atom, to: Destination, message: Term) {
    if let Some(target) = to.node() {
        if target != node.name() {
            warn!(peer = %peer, destination = %to, "Dropping message addressed to another node");
            return;
        }
    }

    if let Err(e) = node.deliver_local(&to, message) {
        debug!(peer = %peer, error = %e, "Dropping undeliverable message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(table: &PeerTable, node: &str) -> (PeerLink, mpsc::UnboundedReceiver<Frame>) {
        let (outbound, queue) = mpsc::unbounded_channel();
        let link = PeerLink {
            id: table.next_id(),
            node: Atom::from(node),
            outbound,
        };
        (link, queue)
    }

    #[test]
    fn test_one_link_per_peer() {
        let table = PeerTable::new();
        let (first, _q1) = link(&table, "peer@localhost");
        let (second, _q2) = link(&table, "peer@localhost");

        assert!(table.insert(first));
        assert!(!table.insert(second));
        assert_eq!(table.nodes(), vec![Atom::from("peer@localhost")]);
    }

    #[test]
    fn test_stale_link_does_not_remove_replacement() {
        let table = PeerTable::new();
        let peer = Atom::from("peer@localhost");
        let (old, _q1) = link(&table, "peer@localhost");
        let old_id = old.id;
        assert!(table.insert(old));
        assert!(table.remove_link(&peer, old_id));

        let (new, _q2) = link(&table, "peer@localhost");
        assert!(table.insert(new));
        assert!(!table.remove_link(&peer, old_id));
        assert!(table.contains(&peer));
    }

    #[tokio::test]
    async fn test_link_queues_send_frames() {
        let table = PeerTable::new();
        let (link, mut queue) = link(&table, "peer@localhost");

        link.send(Destination::remote("go_srv", "peer@localhost"), Term::atom("stop"))
            .unwrap();
        match queue.recv().await {
            Some(Frame::Send { to, message }) => {
                assert_eq!(to, Destination::remote("go_srv", "peer@localhost"));
                assert_eq!(message, Term::atom("stop"));
            }
            other => panic!("Expected send frame, got {:?}", other),
        }

        drop(queue);
        let err = link.send(Destination::from("go_srv"), Term::nil()).unwrap_err();
        assert_eq!(err.category(), "not_connected");
    }
}

//! Per-connection task on the server.
//!
//! Each accepted socket spawns a tokio task that:
//! 1. Registers an outbound queue with the [`ConnectionRegistry`].
//! 2. Runs the peer loop: inbound entries go to the local clipboard,
//!    queued broadcasts go out on the socket.
//! 3. Deregisters and drops (closes) the socket when the loop ends.
//!
//! Inbound entries are never re-broadcast to other peers.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::clipboard::ClipboardProvider;
use crate::peer::{self, OUTBOUND_QUEUE_DEPTH, PeerEnd};

use super::registry::{ConnectionId, ConnectionRegistry};

/// Spawn a connection handler task.
pub fn spawn_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    clipboard: Arc<dyn ClipboardProvider>,
) {
    tokio::spawn(async move {
        let conn_id = ConnectionId::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);

        registry.register(conn_id, outbound_tx).await;
        tracing::info!(?conn_id, peer = %peer_addr, "peer connected");

        match peer::run_peer(stream, outbound_rx, &clipboard).await {
            Ok(PeerEnd::Eof) => {
                tracing::info!(?conn_id, peer = %peer_addr, "peer disconnected");
            }
            Ok(PeerEnd::Disconnected) => {
                tracing::debug!(?conn_id, peer = %peer_addr, "connection dropped by server");
            }
            Err(e) => {
                tracing::info!(?conn_id, peer = %peer_addr, error = %e, "peer connection closed");
            }
        }

        // Always deregister, whatever ended the loop.
        registry.deregister(conn_id).await;
        tracing::debug!(?conn_id, "connection cleaned up");
    });
}

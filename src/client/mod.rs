//! Client mode — one persistent connection to a server, re-established
//! forever.
//!
//! The reconnect loop cycles `connect → receive → disconnect`, sleeping
//! with [`Backoff`] between cycles. The connection slot holds the
//! outbound queue of the live connection; the multiplexer reads it under
//! the shared lock and drops updates while it is empty.

mod backoff;

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{RwLock, watch};

use crate::clipboard::ClipboardProvider;
use crate::ipc::protocol::Entry;
use crate::multiplexer::{self, EntrySink};
use crate::peer::{self, OUTBOUND_QUEUE_DEPTH, PeerEnd};
use crate::status::StatusDisplay;

pub use backoff::{Backoff, BackoffConfig};

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` of the server.
    pub server_addr: String,
    pub backoff: BackoffConfig,
}

/// Where the reconnect loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// A freshly dialed connection, handed from `connect` to `receive`.
struct Session {
    stream: TcpStream,
    outbound: mpsc::Receiver<Entry>,
}

pub struct Client {
    config: ClientConfig,
    /// Outbound queue of the live connection, if any.
    slot: RwLock<Option<mpsc::Sender<Entry>>>,
    state: watch::Sender<LinkState>,
    clipboard: Arc<dyn ClipboardProvider>,
    status: Arc<dyn StatusDisplay>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        clipboard: Arc<dyn ClipboardProvider>,
        status: Arc<dyn StatusDisplay>,
    ) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            config,
            slot: RwLock::new(None),
            state,
            clipboard,
            status,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Watch link state transitions.
    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    /// Run the multiplexer and the reconnect loop until `shutdown`
    /// resolves.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        self.status
            .set_status(&format!("Connecting to: {}", self.config.server_addr));

        let multiplexer = {
            let client = Arc::clone(&self);
            tokio::spawn(async move {
                multiplexer::run(client.clipboard.as_ref(), client.as_ref()).await;
            })
        };

        tokio::select! {
            _ = self.reconnect_loop() => {}
            _ = shutdown => {}
        }

        multiplexer.abort();
        self.disconnect().await;
        tracing::info!("client stopped");
    }

    async fn reconnect_loop(&self) {
        let mut backoff = Backoff::new(self.config.backoff);
        let mut failures: u32 = 0;

        loop {
            match self.connect().await {
                Ok(session) => {
                    failures = 0;
                    backoff.reset();
                    self.receive(session).await;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if failures == 1 {
                        tracing::warn!(addr = %self.config.server_addr, error = %e, "connect failed, retrying");
                    } else {
                        tracing::debug!(addr = %self.config.server_addr, error = %e, attempt = failures, "connect failed");
                    }
                }
            }

            self.disconnect().await;

            let delay = backoff.next_delay();
            tracing::trace!(?delay, "waiting before reconnect");
            tokio::time::sleep(delay).await;
        }
    }

    /// Dial the server and install the new connection in the slot.
    /// On failure the slot is left empty.
    async fn connect(&self) -> io::Result<Session> {
        self.state.send_replace(LinkState::Connecting);
        let stream = TcpStream::connect(&self.config.server_addr).await?;
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);

        *self.slot.write().await = Some(outbound_tx);

        tracing::info!(addr = %self.config.server_addr, "connected");
        self.status
            .set_status(&format!("Connected to: {}", self.config.server_addr));
        self.state.send_replace(LinkState::Connected);

        Ok(Session {
            stream,
            outbound: outbound_rx,
        })
    }

    /// Run the peer loop on the live connection until it ends.
    async fn receive(&self, session: Session) {
        match peer::run_peer(session.stream, session.outbound, &self.clipboard).await {
            Ok(PeerEnd::Eof) => tracing::info!("server closed the connection"),
            Ok(PeerEnd::Disconnected) => tracing::debug!("connection dropped locally"),
            Err(e) => tracing::warn!(error = %e, "connection lost"),
        }
    }

    /// Clear the slot and report the link as down. Dropping the outbound
    /// sender also ends a peer loop that is still running.
    async fn disconnect(&self) {
        let previous = self.slot.write().await.take();
        if previous.is_some() {
            tracing::info!(addr = %self.config.server_addr, "disconnected");
        }
        self.status.set_status("Disconnected");
        self.state.send_replace(LinkState::Disconnected);
    }
}

impl EntrySink for Client {
    async fn deliver(&self, entry: Entry) {
        let slot = self.slot.read().await;
        let Some(outbound) = slot.as_ref() else {
            tracing::debug!(format = %entry.format, "not connected, dropping update");
            return;
        };

        match outbound.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                tracing::warn!(format = %entry.format, "outbound queue full, dropping update");
            }
            Err(TrySendError::Closed(entry)) => {
                tracing::debug!(format = %entry.format, "connection closing, dropping update");
            }
        }
    }
}

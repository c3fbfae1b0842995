//! Server mode — accept peers and broadcast local clipboard changes.
//!
//! Architecture: one acceptor loop, one task per connection, one
//! multiplexer task. The only shared state is the
//! [`ConnectionRegistry`]; connection tasks register and deregister
//! themselves, the multiplexer broadcasts through it.

mod connection;
pub mod registry;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::clipboard::ClipboardProvider;
use crate::ipc::protocol::DEFAULT_LISTEN_ADDR;
use crate::multiplexer;
use crate::status::StatusDisplay;

use registry::ConnectionRegistry;

/// Server startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

/// A bound server, ready to [`serve`](Server::serve).
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    clipboard: Arc<dyn ClipboardProvider>,
}

impl Server {
    /// Bind the listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] if the address cannot be bound.
    pub async fn bind(
        config: &ServerConfig,
        clipboard: Arc<dyn ClipboardProvider>,
        status: Arc<dyn StatusDisplay>,
    ) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(&config.listen_addr)
                .await
                .map_err(|e| ServerError::BindFailed {
                    addr: config.listen_addr.clone(),
                    source: e,
                })?;
        let local_addr = listener.local_addr()?;

        tracing::info!(addr = %local_addr, "listening");
        status.set_status(&format!("Listening on: {local_addr}"));

        Ok(Self {
            listener,
            local_addr,
            registry: Arc::new(ConnectionRegistry::new()),
            clipboard,
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[cfg(test)]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections and broadcast clipboard changes until
    /// `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) {
        let multiplexer = {
            let clipboard = Arc::clone(&self.clipboard);
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                multiplexer::run(clipboard.as_ref(), registry.as_ref()).await;
            })
        };

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            connection::spawn_connection(
                                stream,
                                peer_addr,
                                Arc::clone(&self.registry),
                                Arc::clone(&self.clipboard),
                            );
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                        }
                    }
                }
                _ = &mut shutdown => break,
            }
        }

        multiplexer.abort();
        tracing::info!(addr = %self.local_addr, "server stopped");
    }
}

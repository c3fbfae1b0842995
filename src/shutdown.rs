//! Graceful shutdown on SIGTERM or SIGINT.

use tokio::signal::unix::{Signal, SignalKind, signal};

pub struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignals {
    /// Install the handlers. Must be called inside the runtime.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Resolve on the first signal received.
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
            _ = self.sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }
}

mod cli;
mod client;
mod clipboard;
mod ipc;
mod multiplexer;
mod peer;
mod server;
mod shutdown;
mod status;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

use client::{BackoffConfig, Client, ClientConfig};
use clipboard::{ClipboardProvider, XclipClipboard};
use ipc::protocol::{listen_addr, with_default_port};
use server::{Server, ServerConfig};
use shutdown::ShutdownSignals;
use status::{LogStatus, StatusDisplay};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let clipboard = XclipClipboard::new(Duration::from_millis(cli.poll_interval_ms));
    if let Err(e) = clipboard.init() {
        tracing::error!(error = %e, "clipboard unavailable");
        eprintln!("remoter: {e}");
        std::process::exit(1);
    }
    let clipboard: Arc<dyn ClipboardProvider> = Arc::new(clipboard);
    let status: Arc<dyn StatusDisplay> = Arc::new(LogStatus::new());

    let signals = ShutdownSignals::new().unwrap_or_else(|e| {
        eprintln!("remoter: failed to install signal handlers: {e}");
        std::process::exit(1);
    });

    match cli.connect {
        None => {
            let config = ServerConfig {
                listen_addr: listen_addr(&cli.port),
            };
            match Server::bind(&config, clipboard, status).await {
                Ok(server) => server.serve(signals.recv()).await,
                Err(e) => {
                    tracing::error!(error = %e, "server failed");
                    eprintln!("remoter: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(target) => {
            let config = ClientConfig {
                server_addr: with_default_port(&target),
                backoff: BackoffConfig {
                    initial_delay: Duration::from_millis(cli.retry_initial_ms),
                    max_delay: Duration::from_millis(cli.retry_max_ms),
                },
            };
            let client = Arc::new(Client::new(config, clipboard, status));
            client.run(signals.recv()).await;
        }
    }
}

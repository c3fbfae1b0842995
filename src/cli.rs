use clap::Parser;

use crate::ipc::protocol::DEFAULT_LISTEN_ADDR;

#[derive(Parser, Debug)]
#[command(name = "remoter", about = "Share the clipboard between machines over TCP")]
pub struct Cli {
    /// Server to connect to (`host` or `host:port`); runs in server mode if omitted
    #[arg(long, env = "REMOTER_CONNECT")]
    pub connect: Option<String>,

    /// Listen address in server mode (`host:port` or `:port`)
    #[arg(long, env = "REMOTER_PORT", default_value = DEFAULT_LISTEN_ADDR)]
    pub port: String,

    /// Clipboard poll interval in milliseconds
    #[arg(long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Initial reconnect delay in milliseconds
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub retry_initial_ms: u64,

    /// Maximum reconnect delay in milliseconds
    #[arg(long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    pub retry_max_ms: u64,
}

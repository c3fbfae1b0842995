//! ClipboardProvider trait — system clipboard read/write/watch.
//!
//! Platform adapters implement this trait; the server and client only
//! ever see `Arc<dyn ClipboardProvider>`.

#[cfg(test)]
pub mod memory;
pub mod xclip;

use tokio::sync::mpsc;

use crate::ipc::protocol::Format;

pub use xclip::XclipClipboard;

/// Errors returned by clipboard adapters.
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    /// The backing clipboard mechanism cannot be used at all
    /// (e.g. `xclip` missing, no display).
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("clipboard read ({format}): {reason}")]
    Read { format: Format, reason: String },

    #[error("clipboard write ({format}): {reason}")]
    Write { format: Format, reason: String },
}

/// Reads, writes and watches the system clipboard.
///
/// `Send + Sync` is required because writes happen on blocking worker
/// threads while the watch streams are polled from async tasks.
pub trait ClipboardProvider: Send + Sync {
    /// One-time setup. An error here is fatal to startup.
    fn init(&self) -> Result<(), ClipboardError>;

    /// Current clipboard content in `format`, or `None` if the clipboard
    /// holds nothing in that format.
    fn read(&self, format: Format) -> Result<Option<Vec<u8>>, ClipboardError>;

    /// Replace the clipboard content for `format`.
    fn write(&self, format: Format, data: &[u8]) -> Result<(), ClipboardError>;

    /// Stream of content changes for `format`.
    ///
    /// Each call returns an independent stream that stays open for the
    /// life of the provider. Must be called from within a tokio runtime.
    fn watch(&self, format: Format) -> mpsc::Receiver<Vec<u8>>;
}

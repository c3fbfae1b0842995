//! Per-connection loop shared by the server handler and the client.
//!
//! Splits the framed socket into a read half and a write half and drives
//! both at once:
//! 1. Inbound records are applied to the local clipboard (empty
//!    payloads are dropped, unknown formats skipped).
//! 2. Entries queued on the outbound channel are written to the socket.
//!
//! Reading never waits on writing. A write blocked on a full socket
//! buffer still lets the peer's records drain, so two peers sending
//! large images at each other cannot stall.
//!
//! The loop ends on clean EOF, when the outbound sender is dropped
//! (explicit disconnect), or on the first transport or structural
//! decode error. A MessagePack stream has no resync points, so a
//! malformed record ends the connection instead of being skipped.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::clipboard::ClipboardProvider;
use crate::ipc::codec::{CodecError, EntryCodec, Record};
use crate::ipc::protocol::Entry;

/// Outbound entries buffered per connection before updates are dropped.
pub const OUTBOUND_QUEUE_DEPTH: usize = 16;

/// Connection-level errors.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// How a peer loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEnd {
    /// The remote side closed the stream.
    Eof,
    /// The local side dropped the outbound sender.
    Disconnected,
}

/// Run the peer loop until the connection ends.
pub async fn run_peer<S>(
    stream: S,
    mut outbound: mpsc::Receiver<Entry>,
    clipboard: &Arc<dyn ClipboardProvider>,
) -> Result<PeerEnd, PeerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut records) = Framed::new(stream, EntryCodec::new()).split();

    let reading = async {
        while let Some(record) = records.next().await {
            match record? {
                Record::Entry(entry) => apply_entry(clipboard, entry).await,
                Record::UnknownFormat(tag) => {
                    tracing::warn!(format = %tag, "skipping record with unknown format");
                }
            }
        }
        Ok::<_, PeerError>(PeerEnd::Eof)
    };

    let writing = async {
        while let Some(entry) = outbound.recv().await {
            sink.send(entry).await?;
        }
        Ok::<_, PeerError>(PeerEnd::Disconnected)
    };

    tokio::select! {
        end = reading => end,
        end = writing => end,
    }
}

/// Write a received entry to the local clipboard.
///
/// Entries with an empty payload are discarded. Write failures are
/// logged; the connection stays up.
pub async fn apply_entry(clipboard: &Arc<dyn ClipboardProvider>, entry: Entry) {
    if entry.is_empty() {
        tracing::trace!(format = %entry.format, "ignoring empty entry");
        return;
    }

    let format = entry.format;
    let bytes = entry.data.len();
    let clipboard = Arc::clone(clipboard);
    let result = tokio::task::spawn_blocking(move || clipboard.write(entry.format, &entry.data)).await;

    match result {
        Ok(Ok(())) => tracing::debug!(%format, bytes, "applied remote clipboard update"),
        Ok(Err(e)) => tracing::warn!(%format, error = %e, "clipboard write failed"),
        Err(e) => tracing::warn!(%format, error = %e, "clipboard write task failed"),
    }
}

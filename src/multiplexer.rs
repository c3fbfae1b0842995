//! Change multiplexer — merges per-format clipboard watch streams into
//! one sequence of outbound entries.
//!
//! There is no queue in front of the sink: a change observed while the
//! sink has nowhere to send it is dropped.

use std::future::Future;

use crate::clipboard::ClipboardProvider;
use crate::ipc::protocol::{Entry, Format};

/// Destination for locally observed clipboard changes.
///
/// The server delivers to every registered connection; the client to
/// its single active connection, if any.
pub trait EntrySink: Send + Sync {
    fn deliver(&self, entry: Entry) -> impl Future<Output = ()> + Send;
}

/// Forward clipboard changes to `sink` until both watch streams close.
pub async fn run<S: EntrySink>(clipboard: &dyn ClipboardProvider, sink: &S) {
    let mut text = clipboard.watch(Format::Text);
    let mut image = clipboard.watch(Format::Image);
    let mut text_open = true;
    let mut image_open = true;

    loop {
        let entry = tokio::select! {
            data = text.recv(), if text_open => match data {
                Some(data) => Entry::new(Format::Text, data),
                None => {
                    text_open = false;
                    continue;
                }
            },
            data = image.recv(), if image_open => match data {
                Some(data) => Entry::new(Format::Image, data),
                None => {
                    image_open = false;
                    continue;
                }
            },
            else => break,
        };

        tracing::debug!(format = %entry.format, bytes = entry.data.len(), "local clipboard changed");
        sink.deliver(entry).await;
    }

    tracing::debug!("clipboard watch streams closed");
}

//! X11 clipboard provider — read/write via `xclip`, watch by polling.
//!
//! Text uses the `UTF8_STRING` target, images `image/png`. `xclip`
//! exits non-zero when the selection has no data for the requested
//! target; that is reported as "no content", not as an error.

use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use super::{ClipboardError, ClipboardProvider};
use crate::ipc::protocol::Format;

/// Default interval between clipboard polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Change events buffered per watch stream before the poller waits.
const WATCH_QUEUE_DEPTH: usize = 8;

/// X11 implementation of [`ClipboardProvider`] via `xclip`.
///
/// Content written through [`ClipboardProvider::write`] becomes the
/// baseline for change detection, so an update received from a peer is
/// not reported back out as a local change.
#[derive(Clone)]
pub struct XclipClipboard {
    inner: Arc<Inner>,
}

struct Inner {
    poll_interval: Duration,
    /// Last content seen or written, per format.
    last_seen: Mutex<HashMap<Format, Vec<u8>>>,
}

impl XclipClipboard {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                poll_interval,
                last_seen: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl Default for XclipClipboard {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ClipboardProvider for XclipClipboard {
    fn init(&self) -> Result<(), ClipboardError> {
        let status = Command::new("xclip")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| ClipboardError::Unavailable(format!("failed to spawn xclip: {e}")))?;

        if !status.success() {
            return Err(ClipboardError::Unavailable(format!(
                "xclip -version exited with status {status}"
            )));
        }
        if std::env::var_os("DISPLAY").is_none() {
            return Err(ClipboardError::Unavailable("$DISPLAY is not set".into()));
        }
        Ok(())
    }

    fn read(&self, format: Format) -> Result<Option<Vec<u8>>, ClipboardError> {
        read_xclip(format)
    }

    fn write(&self, format: Format, data: &[u8]) -> Result<(), ClipboardError> {
        write_xclip(format, data)?;
        self.inner.remember(format, data);
        Ok(())
    }

    fn watch(&self, format: Format) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(WATCH_QUEUE_DEPTH);
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let mut ticker = time::interval(inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut primed = false;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                let current = match tokio::task::spawn_blocking(move || read_xclip(format)).await {
                    Ok(Ok(Some(content))) => content,
                    Ok(Ok(None)) => {
                        // An empty clipboard is a baseline too.
                        primed = true;
                        continue;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%format, error = %e, "clipboard poll failed");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(%format, error = %e, "clipboard poll task failed");
                        break;
                    }
                };

                let changed = inner.observe(format, &current);
                // The first read only establishes the baseline.
                if !primed {
                    primed = true;
                    continue;
                }
                if changed && tx.send(current).await.is_err() {
                    break;
                }
            }
            tracing::debug!(%format, "clipboard watch stopped");
        });

        rx
    }
}

impl Inner {
    /// Record `content` as the latest value. Returns whether it differs
    /// from what was seen before.
    fn observe(&self, format: Format, content: &[u8]) -> bool {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        if last_seen.get(&format).is_some_and(|prev| prev == content) {
            return false;
        }
        last_seen.insert(format, content.to_vec());
        true
    }

    fn remember(&self, format: Format, content: &[u8]) {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        last_seen.insert(format, content.to_vec());
    }
}

fn target(format: Format) -> &'static str {
    match format {
        Format::Text => "UTF8_STRING",
        Format::Image => "image/png",
    }
}

fn read_xclip(format: Format) -> Result<Option<Vec<u8>>, ClipboardError> {
    let output = Command::new("xclip")
        .args(["-selection", "clipboard", "-t", target(format), "-o"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| ClipboardError::Read {
            format,
            reason: format!("failed to spawn xclip -o: {e}"),
        })?;

    if output.status.success() {
        Ok(Some(output.stdout))
    } else {
        Ok(None)
    }
}

fn write_xclip(format: Format, data: &[u8]) -> Result<(), ClipboardError> {
    let write_err = |reason: String| ClipboardError::Write { format, reason };

    let mut child = Command::new("xclip")
        .args(["-selection", "clipboard", "-t", target(format)])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| write_err(format!("failed to spawn xclip: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(data)
            .map_err(|e| write_err(format!("failed to write to xclip: {e}")))?;
        // Drop stdin to close the pipe so xclip can finish.
    }

    let status = child
        .wait()
        .map_err(|e| write_err(format!("failed to wait for xclip: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(write_err(format!("xclip exited with status {status}")))
    }
}

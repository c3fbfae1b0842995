//! In-memory clipboard for tests.
//!
//! Change streams are created up front, so events emitted before the
//! first `watch` call are buffered rather than lost.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use super::{ClipboardError, ClipboardProvider};
use crate::ipc::protocol::Format;

pub struct MemoryClipboard {
    contents: Mutex<HashMap<Format, Vec<u8>>>,
    writes: Mutex<Vec<(Format, Vec<u8>)>>,
    senders: HashMap<Format, mpsc::Sender<Vec<u8>>>,
    receivers: Mutex<HashMap<Format, mpsc::Receiver<Vec<u8>>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for format in Format::ALL {
            let (tx, rx) = mpsc::channel(64);
            senders.insert(format, tx);
            receivers.insert(format, rx);
        }
        Self {
            contents: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            senders,
            receivers: Mutex::new(receivers),
        }
    }

    /// Simulate a local clipboard change.
    pub async fn emit(&self, format: Format, data: &[u8]) {
        self.contents
            .lock()
            .unwrap()
            .insert(format, data.to_vec());
        self.senders[&format].send(data.to_vec()).await.unwrap();
    }

    /// Every write applied so far, oldest first.
    pub fn writes(&self) -> Vec<(Format, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    /// Poll until at least `count` writes have been applied.
    pub async fn wait_for_writes(&self, count: usize) -> Vec<(Format, Vec<u8>)> {
        loop {
            let writes = self.writes();
            if writes.len() >= count {
                return writes;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl ClipboardProvider for MemoryClipboard {
    fn init(&self) -> Result<(), ClipboardError> {
        Ok(())
    }

    fn read(&self, format: Format) -> Result<Option<Vec<u8>>, ClipboardError> {
        let contents = self.contents.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(contents.get(&format).cloned())
    }

    fn write(&self, format: Format, data: &[u8]) -> Result<(), ClipboardError> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(format, data.to_vec());
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((format, data.to_vec()));
        Ok(())
    }

    fn watch(&self, format: Format) -> mpsc::Receiver<Vec<u8>> {
        let mut receivers = self.receivers.lock().unwrap_or_else(PoisonError::into_inner);
        receivers.remove(&format).unwrap_or_else(|| {
            // Already handed out: give the caller a closed stream.
            mpsc::channel(1).1
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_changes_reach_watcher() {
        let clipboard = MemoryClipboard::new();
        clipboard.emit(Format::Text, b"early").await;
        let mut rx = clipboard.watch(Format::Text);
        assert_eq!(rx.recv().await.unwrap(), b"early");
        assert_eq!(clipboard.read(Format::Text).unwrap().unwrap(), b"early");
    }

    #[tokio::test]
    async fn second_watch_is_closed() {
        let clipboard = MemoryClipboard::new();
        let _first = clipboard.watch(Format::Image);
        let mut second = clipboard.watch(Format::Image);
        assert!(second.recv().await.is_none());
    }

    #[test]
    fn writes_are_recorded() {
        let clipboard = MemoryClipboard::new();
        clipboard.write(Format::Text, b"x").unwrap();
        assert_eq!(clipboard.writes(), vec![(Format::Text, b"x".to_vec())]);
        assert_eq!(clipboard.read(Format::Text).unwrap().unwrap(), b"x");
    }
}

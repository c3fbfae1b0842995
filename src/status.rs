//! Status display — human-readable connectivity state.
//!
//! Best-effort: implementations must not block and have no way to
//! report failure back to the caller.

use std::sync::{Mutex, PoisonError};

pub trait StatusDisplay: Send + Sync {
    fn set_status(&self, text: &str);
}

/// Emits status transitions as `tracing` events.
///
/// Repeats of the current status are suppressed, so a reconnect loop
/// that keeps reporting "Disconnected" logs it once.
#[derive(Default)]
pub struct LogStatus {
    current: Mutex<String>,
}

impl LogStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusDisplay for LogStatus {
    fn set_status(&self, text: &str) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == text {
            return;
        }
        current.clear();
        current.push_str(text);
        tracing::info!(target: "remoter::status", status = text, "status changed");
    }
}

/// Records every status update (tests).
#[cfg(test)]
#[derive(Default)]
pub struct RecordingStatus {
    history: Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingStatus {
    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history.lock().unwrap().last().cloned()
    }
}

#[cfg(test)]
impl StatusDisplay for RecordingStatus {
    fn set_status(&self, text: &str) {
        self.history.lock().unwrap().push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_status_tracks_current_text() {
        let status = LogStatus::new();
        status.set_status("Disconnected");
        status.set_status("Disconnected");
        assert_eq!(*status.current.lock().unwrap(), "Disconnected");
        status.set_status("Connected to: host:1");
        assert_eq!(*status.current.lock().unwrap(), "Connected to: host:1");
    }

    #[test]
    fn recording_status_keeps_history() {
        let status = RecordingStatus::default();
        status.set_status("a");
        status.set_status("b");
        assert_eq!(status.history(), vec!["a", "b"]);
        assert_eq!(status.last().as_deref(), Some("b"));
    }
}

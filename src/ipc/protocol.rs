//! Wire protocol types for clipboard sync.
//!
//! Every record on the wire is a MessagePack map with a `format` tag and
//! a binary `data` payload. Records are written back to back; the
//! MessagePack encoding is self-delimiting, so there is no length prefix.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default TCP port for both listening and dialing.
pub const DEFAULT_PORT: u16 = 30359;

/// Default server listen address (all interfaces).
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:30359";

/// Maximum size of a single encoded record (64 MiB).
///
/// Images dominate record size; a buffered record that grows past this
/// without completing is treated as a corrupt stream.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Clipboard content format.
///
/// Closed set: a record carrying any other tag is reported as
/// [`Record::UnknownFormat`](super::codec::Record::UnknownFormat) rather
/// than coerced into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Text,
    Image,
}

impl Format {
    /// All formats, in watch order.
    pub const ALL: [Format; 2] = [Format::Text, Format::Image];

    /// Tag written on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Image => "image",
        }
    }

    /// Parse a wire tag. Returns `None` for tags this build does not know.
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(Format::Text),
            "image" => Some(Format::Image),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One clipboard change: a format tag plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub format: Format,
    pub data: Vec<u8>,
}

impl Entry {
    pub fn new(format: Format, data: Vec<u8>) -> Self {
        Self { format, data }
    }

    /// Empty entries may travel on the wire but are never applied.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Serialized shape of an [`Entry`].
///
/// The tag stays a string here so that unknown formats survive
/// deserialization and can be skipped with the stream still in sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireRecord {
    pub format: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl From<Entry> for WireRecord {
    fn from(entry: Entry) -> Self {
        Self {
            format: entry.format.wire_name().to_string(),
            data: entry.data,
        }
    }
}

/// Append [`DEFAULT_PORT`] to a client target that has none.
///
/// Accepts `host`, `host:port`, `[v6]` and `[v6]:port`. A bare IPv6
/// literal (more than one colon, no brackets) is bracketed first.
pub fn with_default_port(target: &str) -> String {
    if target.starts_with('[') {
        if target.ends_with(']') {
            return format!("{target}:{DEFAULT_PORT}");
        }
        return target.to_string();
    }
    match target.matches(':').count() {
        0 => format!("{target}:{DEFAULT_PORT}"),
        1 => target.to_string(),
        _ => format!("[{target}]:{DEFAULT_PORT}"),
    }
}

/// Normalize a listen address. `":port"` binds all interfaces.
pub fn listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        with_default_port(addr)
    }
}

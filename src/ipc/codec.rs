//! Self-delimiting MessagePack codec for tokio I/O.
//!
//! Framing: none. Each record is one MessagePack map. The decoder walks
//! the value headers to learn how many bytes the record spans, waits
//! until that many are buffered, then deserializes the record once.
//! Bin and str payloads are skipped by length, so a large image costs
//! one header walk per read rather than one full parse.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::protocol::{Entry, Format, MAX_RECORD_SIZE, WireRecord};

/// The one byte MessagePack never assigns.
const NEVER_USED_MARKER: u8 = 0xc1;

/// Codec error type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("record too large: {0} bytes (max {1})")]
    RecordTooLarge(usize, usize),
    #[error("invalid MessagePack marker 0x{0:02x} at byte {1}")]
    InvalidMarker(u8, usize),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A record in a format this build understands.
    Entry(Entry),
    /// Well-formed record with a format tag this build does not know.
    /// Its bytes have been consumed, so the stream is still in sync.
    UnknownFormat(String),
}

/// Entry codec: encodes [`Entry`] values, decodes [`Record`] values.
#[derive(Debug)]
pub struct EntryCodec {
    max_record_size: usize,
    /// Bytes the record at the head of the buffer needs at minimum.
    pending_len: Option<usize>,
}

impl EntryCodec {
    pub fn new() -> Self {
        Self::with_max_record_size(MAX_RECORD_SIZE)
    }

    pub fn with_max_record_size(max_record_size: usize) -> Self {
        Self {
            max_record_size,
            pending_len: None,
        }
    }
}

impl Default for EntryCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EntryCodec {
    type Item = Record;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        if self.pending_len.is_some_and(|needed| src.len() < needed) {
            return Ok(None);
        }

        let record_len = match scan_value(src)? {
            Scan::Complete(len) => len,
            Scan::Partial(needed) => {
                if needed > self.max_record_size {
                    return Err(CodecError::RecordTooLarge(needed, self.max_record_size));
                }
                // Reserve space for the remaining bytes to avoid repeated
                // small allocations.
                src.reserve(needed - src.len());
                self.pending_len = Some(needed);
                return Ok(None);
            }
        };
        self.pending_len = None;

        if record_len > self.max_record_size {
            return Err(CodecError::RecordTooLarge(record_len, self.max_record_size));
        }

        let record: WireRecord = rmp_serde::from_slice(&src[..record_len])?;
        src.advance(record_len);
        Ok(Some(into_record(record)))
    }
}

impl Encoder<Entry> for EntryCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Entry, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = rmp_serde::to_vec_named(&WireRecord::from(item))?;
        if payload.len() > self.max_record_size {
            return Err(CodecError::RecordTooLarge(payload.len(), self.max_record_size));
        }
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

fn into_record(record: WireRecord) -> Record {
    match Format::from_wire(&record.format) {
        Some(format) => Record::Entry(Entry::new(format, record.data)),
        None => Record::UnknownFormat(record.format),
    }
}

/// Result of walking the head of a buffer for one MessagePack value.
#[derive(Debug, PartialEq, Eq)]
enum Scan {
    /// The first value spans exactly this many bytes.
    Complete(usize),
    /// The value needs at least this many bytes to be complete.
    Partial(usize),
}

/// Find the encoded length of the first MessagePack value in `buf`
/// without decoding it.
fn scan_value(buf: &[u8]) -> Result<Scan, CodecError> {
    let mut pos: usize = 0;
    // Values still to walk: the root plus container children seen so far.
    let mut remaining: usize = 1;

    while remaining > 0 {
        remaining -= 1;

        let Some(&marker) = buf.get(pos) else {
            return Ok(Scan::Partial(pos + 1));
        };
        if marker == NEVER_USED_MARKER {
            return Err(CodecError::InvalidMarker(marker, pos));
        }
        let Some(layout) = value_layout(marker, buf, pos) else {
            return Ok(Scan::Partial(buf.len() + 1));
        };

        pos = pos
            .saturating_add(layout.header)
            .saturating_add(layout.body);
        if pos > buf.len() {
            return Ok(Scan::Partial(pos));
        }
        remaining = remaining.saturating_add(layout.children);
    }

    Ok(Scan::Complete(pos))
}

/// Shape of one encoded value: fixed header bytes, opaque payload
/// bytes, and nested values that follow it.
struct Layout {
    header: usize,
    body: usize,
    children: usize,
}

/// Layout of the value whose marker sits at `pos`, or `None` when its
/// length field is not fully buffered yet.
fn value_layout(marker: u8, buf: &[u8], pos: usize) -> Option<Layout> {
    let (header, body, children) = match marker {
        // fixint, nil, bool. 0xc1 is rejected before we get here.
        0x00..=0x7f | 0xc0..=0xc3 | 0xe0..=0xff => (1, 0, 0),
        0x80..=0x8f => (1, 0, 2 * usize::from(marker & 0x0f)),
        0x90..=0x9f => (1, 0, usize::from(marker & 0x0f)),
        0xa0..=0xbf => (1, usize::from(marker & 0x1f), 0),
        // bin/str with 8, 16 and 32 bit lengths
        0xc4 | 0xd9 => (2, be_len(buf, pos, 1)?, 0),
        0xc5 | 0xda => (3, be_len(buf, pos, 2)?, 0),
        0xc6 | 0xdb => (5, be_len(buf, pos, 4)?, 0),
        // ext: length, then one type byte
        0xc7 => (3, be_len(buf, pos, 1)?, 0),
        0xc8 => (4, be_len(buf, pos, 2)?, 0),
        0xc9 => (6, be_len(buf, pos, 4)?, 0),
        0xca => (1, 4, 0),
        0xcb => (1, 8, 0),
        0xcc | 0xd0 => (1, 1, 0),
        0xcd | 0xd1 => (1, 2, 0),
        0xce | 0xd2 => (1, 4, 0),
        0xcf | 0xd3 => (1, 8, 0),
        // fixext: type byte plus 1..16 data bytes
        0xd4 => (2, 1, 0),
        0xd5 => (2, 2, 0),
        0xd6 => (2, 4, 0),
        0xd7 => (2, 8, 0),
        0xd8 => (2, 16, 0),
        0xdc => (3, 0, be_len(buf, pos, 2)?),
        0xdd => (5, 0, be_len(buf, pos, 4)?),
        0xde => (3, 0, be_len(buf, pos, 2)?.saturating_mul(2)),
        0xdf => (5, 0, be_len(buf, pos, 4)?.saturating_mul(2)),
    };
    Some(Layout {
        header,
        body,
        children,
    })
}

/// Big-endian length field of `width` bytes right after the marker.
fn be_len(buf: &[u8], marker_pos: usize, width: usize) -> Option<usize> {
    let start = marker_pos + 1;
    let bytes = buf.get(start..start + width)?;
    Some(bytes.iter().fold(0usize, |acc, b| (acc << 8) | usize::from(*b)))
}

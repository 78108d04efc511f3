//! Payload framing for capture files
//!
//! A capture file is a flat sequence of records. Each record starts with a
//! one-line whitespace-separated metadata header (`kind id timestamp`,
//! followed by optional extra fields) and carries an opaque body; records
//! are delimited by a reserved separator line. The codec is pure parsing:
//! it never touches the filesystem and never fails. Malformed metadata
//! degrades to defaults so a bad record cannot abort a replay.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Separator written between records in a capture file.
///
/// The leading newline terminates the previous record's body; the rest is
/// a line of its own, so a line-oriented scanner can detect record
/// boundaries without lookahead.
pub const RECORD_SEPARATOR: &str = "\n🐵🙈🙉\n";

/// The separator as seen by a line scanner: everything after the leading
/// newline, trailing newline included.
pub(crate) fn separator_line() -> &'static [u8] {
    &RECORD_SEPARATOR.as_bytes()[1..]
}

/// Kind of a captured record, from the single-character class tag at the
/// start of its header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// An original captured request
    Request,
    /// An original captured response
    Response,
    /// A response observed during a previous replay run
    ReplayedResponse,
}

impl RecordKind {
    /// Parse a kind from its on-disk tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'1' => Some(Self::Request),
            b'2' => Some(Self::Response),
            b'3' => Some(Self::ReplayedResponse),
            _ => None,
        }
    }

    /// The on-disk tag byte for this kind
    pub fn tag(&self) -> u8 {
        match self {
            Self::Request => b'1',
            Self::Response => b'2',
            Self::ReplayedResponse => b'3',
        }
    }

    /// Kind name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::ReplayedResponse => "replayed_response",
        }
    }
}

/// One captured traffic event: parsed header metadata plus opaque body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record class (request, response, ...)
    pub kind: RecordKind,
    /// Correlation token pairing requests with their responses; opaque here
    pub id: String,
    /// Capture time in nanoseconds since the epoch; 0 means "no timing
    /// information" and disables pacing for this record
    pub timestamp: i64,
    /// Payload bytes following the header line, exclusive of the newline
    /// that introduces the separator
    pub body: Bytes,
}

impl Record {
    /// Create a new record
    pub fn new(kind: RecordKind, id: impl Into<String>, timestamp: i64, body: Bytes) -> Self {
        Self {
            kind,
            id: id.into(),
            timestamp,
            body,
        }
    }
}

/// Decode one record from its accumulated bytes (everything between two
/// separators, with the newline preceding the separator already stripped).
///
/// Parsing is lenient: an unknown kind tag falls back to
/// [`RecordKind::Request`], an unparseable timestamp falls back to 0, and
/// missing header fields default. An empty buffer (two consecutive
/// separators) is a valid record with an empty body.
pub fn decode(raw: &[u8]) -> Record {
    let (header, body) = match raw.iter().position(|&b| b == b'\n') {
        Some(idx) => (&raw[..idx], &raw[idx + 1..]),
        None => (raw, &raw[raw.len()..]),
    };

    let mut tokens = header
        .split(|b: &u8| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty());

    let kind = match tokens.next() {
        None => RecordKind::Request,
        Some(tag) => match tag.first().copied().and_then(RecordKind::from_tag) {
            Some(kind) => kind,
            None => {
                warn!(
                    tag = %String::from_utf8_lossy(tag),
                    "unknown record kind tag, assuming request"
                );
                RecordKind::Request
            }
        },
    };

    let id = tokens
        .next()
        .map(|t| String::from_utf8_lossy(t).into_owned())
        .unwrap_or_default();

    // Remaining header fields (e.g. latency on replayed responses) are
    // opaque to the replay core and ignored.
    let timestamp = match tokens.next() {
        None => 0,
        Some(field) => match std::str::from_utf8(field)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
        {
            Some(ts) => ts,
            None => {
                warn!(
                    field = %String::from_utf8_lossy(field),
                    "malformed record timestamp, replaying without pacing info"
                );
                0
            }
        },
    };

    Record {
        kind,
        id,
        timestamp,
        // Copy out of the caller's scan buffer: the emitted body must stay
        // valid after the reader overwrites that buffer on the next record.
        body: Bytes::copy_from_slice(body),
    }
}

/// Encode a record in the on-disk framing, separator included
pub fn encode(record: &Record) -> Vec<u8> {
    let mut out = Vec::with_capacity(record.body.len() + record.id.len() + 32);
    out.push(record.kind.tag());
    out.push(b' ');
    out.extend_from_slice(record.id.as_bytes());
    out.push(b' ');
    out.extend_from_slice(record.timestamp.to_string().as_bytes());
    out.push(b'\n');
    out.extend_from_slice(&record.body);
    out.extend_from_slice(RECORD_SEPARATOR.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strip the framing the way the file reader does: drop the separator
    /// and the newline immediately preceding it.
    fn framed_to_raw(framed: &[u8]) -> &[u8] {
        let end = framed.len() - RECORD_SEPARATOR.len();
        &framed[..end]
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let record = Record::new(
            RecordKind::Request,
            "a42f11",
            1_654_000_123_456_789_000,
            Bytes::from("GET /health HTTP/1.1\r\nHost: api\r\n\r\n"),
        );

        let framed = encode(&record);
        assert!(framed.ends_with(RECORD_SEPARATOR.as_bytes()));

        let decoded = decode(framed_to_raw(&framed));
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_roundtrip_preserves_trailing_newline_in_body() {
        let record = Record::new(
            RecordKind::Response,
            "b7",
            42,
            Bytes::from("HTTP/1.1 200 OK\r\n\r\nbody\n"),
        );
        let framed = encode(&record);
        let decoded = decode(framed_to_raw(&framed));
        assert_eq!(decoded.body, record.body);
    }

    #[test]
    fn test_decode_empty_buffer_is_empty_record() {
        let record = decode(b"");
        assert_eq!(record.kind, RecordKind::Request);
        assert_eq!(record.id, "");
        assert_eq!(record.timestamp, 0);
        assert!(record.body.is_empty());
    }

    #[test]
    fn test_decode_malformed_timestamp_falls_back_to_zero() {
        let record = decode(b"1 deadbeef not-a-number\npayload");
        assert_eq!(record.kind, RecordKind::Request);
        assert_eq!(record.id, "deadbeef");
        assert_eq!(record.timestamp, 0);
        assert_eq!(record.body, Bytes::from("payload"));
    }

    #[test]
    fn test_decode_unknown_kind_falls_back_to_request() {
        let record = decode(b"9 id 1000\nx");
        assert_eq!(record.kind, RecordKind::Request);
        assert_eq!(record.timestamp, 1000);
    }

    #[test]
    fn test_decode_ignores_extra_header_fields() {
        // Replayed responses carry a latency field after the timestamp.
        let record = decode(b"3 cafe 5000 123456\nbody");
        assert_eq!(record.kind, RecordKind::ReplayedResponse);
        assert_eq!(record.id, "cafe");
        assert_eq!(record.timestamp, 5000);
        assert_eq!(record.body, Bytes::from("body"));
    }

    #[test]
    fn test_decode_header_only_record() {
        let record = decode(b"2 ff 77");
        assert_eq!(record.kind, RecordKind::Response);
        assert_eq!(record.timestamp, 77);
        assert!(record.body.is_empty());
    }

    #[test]
    fn test_kind_tags() {
        for kind in [
            RecordKind::Request,
            RecordKind::Response,
            RecordKind::ReplayedResponse,
        ] {
            assert_eq!(RecordKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(RecordKind::from_tag(b'x'), None);
    }
}

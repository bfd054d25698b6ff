//! Line codec for the BCM serial protocol.
//!
//! `DoorLineCodec` implements the tokio-util [`Decoder`] trait over
//! [`BytesMut`], so it can drive a `FramedRead` stream or be fed by hand from
//! a blocking reader thread. Outbound commands are single fixed lines and go
//! out through [`DoorCommand::as_line`](crate::DoorCommand::as_line).
//!
//! The decoder yields only recognised [`DoorStatus`] lines. Unknown lines,
//! non-UTF-8 lines and lines longer than the limit are dropped without
//! failing the stream; the BCM is free to print boot banners or debug text.

use crate::protocol::DoorStatus;
use bytes::BytesMut;
use carberus_core::EventCategory;
use carberus_core::constants::{LINE_TERMINATOR, MAX_STATUS_LINE_LEN};
use tokio_util::codec::Decoder;
use tracing::trace;

/// Codec for newline-delimited BCM traffic.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use carberus_door::{DoorLineCodec, DoorStatus};
/// use tokio_util::codec::Decoder;
///
/// let mut codec = DoorLineCodec::new();
/// let mut buf = BytesMut::from(&b"hello\nACK:LOCKED\nACK:UN"[..]);
///
/// assert_eq!(codec.decode(&mut buf).unwrap(), Some(DoorStatus::Locked));
/// assert_eq!(codec.decode(&mut buf).unwrap(), None);
/// assert_eq!(&buf[..], b"ACK:UN");
/// ```
#[derive(Debug)]
pub struct DoorLineCodec {
    max_line_len: usize,
    /// Set while skipping the rest of an overlong line.
    discarding: bool,
    /// Lines dropped because they were not a known status.
    ignored_lines: u64,
}

impl DoorLineCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_len(MAX_STATUS_LINE_LEN)
    }

    #[must_use]
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            max_line_len,
            discarding: false,
            ignored_lines: 0,
        }
    }

    #[must_use]
    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    /// Number of complete lines dropped so far.
    #[must_use]
    pub fn ignored_lines(&self) -> u64 {
        self.ignored_lines
    }

    fn classify(&mut self, line: &[u8]) -> Option<DoorStatus> {
        let status = std::str::from_utf8(line)
            .ok()
            .and_then(DoorStatus::parse_line);
        if status.is_none() {
            self.ignored_lines += 1;
            trace!(
                category = EventCategory::Connectivity.as_str(),
                line = %String::from_utf8_lossy(line),
                "Ignoring BCM line"
            );
        }
        status
    }
}

impl Default for DoorLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for DoorLineCodec {
    type Item = DoorStatus;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = buf.iter().position(|b| *b == LINE_TERMINATOR) else {
                if buf.len() > self.max_line_len {
                    buf.clear();
                    if !self.discarding {
                        self.discarding = true;
                        self.ignored_lines += 1;
                    }
                }
                return Ok(None);
            };

            let line = buf.split_to(pos + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if pos > self.max_line_len {
                self.ignored_lines += 1;
                continue;
            }
            if let Some(status) = self.classify(&line[..pos]) {
                return Ok(Some(status));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(status) = self.decode(buf)? {
            return Ok(Some(status));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        // Final line without terminator.
        let line = buf.split();
        if self.discarding {
            self.discarding = false;
            return Ok(None);
        }
        Ok(self.classify(&line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut DoorLineCodec, buf: &mut BytesMut) -> Vec<DoorStatus> {
        let mut out = Vec::new();
        while let Some(status) = codec.decode(buf).unwrap() {
            out.push(status);
        }
        out
    }

    #[test]
    fn test_decode_multiple_lines() {
        let mut codec = DoorLineCodec::new();
        let mut buf = BytesMut::from(&b"ACK:UNLOCKED\nSTATUS:TIMEOUT\r\nACK:LOCKED\n"[..]);

        assert_eq!(
            decode_all(&mut codec, &mut buf),
            vec![
                DoorStatus::Unlocked,
                DoorStatus::RelockTimeout,
                DoorStatus::Locked
            ]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_line_across_reads() {
        let mut codec = DoorLineCodec::new();
        let mut buf = BytesMut::from(&b"ACK:UNL"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"OCKED\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(DoorStatus::Unlocked));
    }

    #[test]
    fn test_unknown_and_invalid_lines_are_skipped() {
        let mut codec = DoorLineCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"BCM READY\n");
        buf.extend_from_slice(&[0xFF, 0xFE, b'\n']);
        buf.extend_from_slice(b"ACK:LOCKED\n");

        assert_eq!(decode_all(&mut codec, &mut buf), vec![DoorStatus::Locked]);
        assert_eq!(codec.ignored_lines(), 2);
    }

    #[test]
    fn test_overlong_line_is_discarded() {
        let mut codec = DoorLineCodec::with_max_line_len(16);
        let mut buf = BytesMut::from(&[b'x'; 40][..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        // Tail of the overlong line, then a good one.
        buf.extend_from_slice(b"xxxx\nACK:LOCKED\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(DoorStatus::Locked));
        assert_eq!(codec.ignored_lines(), 1);
    }

    #[test]
    fn test_decode_eof_flushes_unterminated_line() {
        let mut codec = DoorLineCodec::new();
        let mut buf = BytesMut::from(&b"STATUS:TIMEOUT"[..]);

        assert_eq!(
            codec.decode_eof(&mut buf).unwrap(),
            Some(DoorStatus::RelockTimeout)
        );
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }
}

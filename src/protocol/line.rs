//! Line terminator scanning and text decoding.
//!
//! A line ends at `\n`, `\r\n` or a lone `\r`. A `\r` that is the last
//! buffered byte is ambiguous until the next byte arrives, so the scanner
//! reports it separately and lets the caller decide whether to wait.

use std::borrow::Cow;

/// Result of scanning a buffer for a line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineScan {
    /// A full line: `content` bytes of text followed by a terminator,
    /// `consumed` bytes in total.
    Complete { content: usize, consumed: usize },
    /// The buffer ends in `\r`; a following `\n` would belong to the same
    /// terminator.
    PendingCr { content: usize },
    /// No terminator in the buffer.
    Incomplete,
}

/// Scan `buf` for the first line terminator.
///
/// # Example
///
/// ```
/// use dockwire_client::protocol::{scan_line, LineScan};
///
/// assert_eq!(
///     scan_line(b"ab\r\ncd"),
///     LineScan::Complete { content: 2, consumed: 4 }
/// );
/// assert_eq!(scan_line(b"ab\r"), LineScan::PendingCr { content: 2 });
/// assert_eq!(scan_line(b"ab"), LineScan::Incomplete);
/// ```
pub fn scan_line(buf: &[u8]) -> LineScan {
    let Some(pos) = buf.iter().position(|&b| b == b'\n' || b == b'\r') else {
        return LineScan::Incomplete;
    };

    if buf[pos] == b'\n' {
        return LineScan::Complete {
            content: pos,
            consumed: pos + 1,
        };
    }

    match buf.get(pos + 1) {
        Some(b'\n') => LineScan::Complete {
            content: pos,
            consumed: pos + 2,
        },
        Some(_) => LineScan::Complete {
            content: pos,
            consumed: pos + 1,
        },
        None => LineScan::PendingCr { content: pos },
    }
}

/// Bytes of `payload` before its first line terminator.
pub fn first_line(payload: &[u8]) -> &[u8] {
    match scan_line(payload) {
        LineScan::Complete { content, .. } | LineScan::PendingCr { content } => {
            &payload[..content]
        }
        LineScan::Incomplete => payload,
    }
}

/// Split point for a line capped at `limit` bytes.
///
/// Moves back to the start of a UTF-8 sequence that straddles `limit`. Falls
/// back to `limit` when the bytes before it are not valid UTF-8 or no
/// complete character fits.
pub fn char_boundary(bytes: &[u8], limit: usize) -> usize {
    let limit = limit.min(bytes.len());
    match std::str::from_utf8(&bytes[..limit]) {
        Ok(_) => limit,
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => e.valid_up_to(),
        Err(_) => limit,
    }
}

/// Decode bytes as UTF-8, replacing invalid sequences.
pub fn decode_text(bytes: &[u8]) -> String {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => s.to_owned(),
        Cow::Owned(s) => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_lf() {
        assert_eq!(
            scan_line(b"hello\nworld"),
            LineScan::Complete {
                content: 5,
                consumed: 6
            }
        );
    }

    #[test]
    fn test_scan_crlf() {
        assert_eq!(
            scan_line(b"hi\r\n"),
            LineScan::Complete {
                content: 2,
                consumed: 4
            }
        );
    }

    #[test]
    fn test_scan_lone_cr() {
        assert_eq!(
            scan_line(b"hi\rthere"),
            LineScan::Complete {
                content: 2,
                consumed: 3
            }
        );
    }

    #[test]
    fn test_scan_trailing_cr_pending() {
        assert_eq!(scan_line(b"hi\r"), LineScan::PendingCr { content: 2 });
    }

    #[test]
    fn test_scan_empty_line() {
        assert_eq!(
            scan_line(b"\n"),
            LineScan::Complete {
                content: 0,
                consumed: 1
            }
        );
        assert_eq!(scan_line(b""), LineScan::Incomplete);
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line(b"one\ntwo\n"), b"one");
        assert_eq!(first_line(b"one\r\ntwo"), b"one");
        assert_eq!(first_line(b"no terminator"), b"no terminator");
        assert_eq!(first_line(b"cr\r"), b"cr");
        assert_eq!(first_line(b""), b"");
    }

    #[test]
    fn test_char_boundary() {
        let text = "héllo".as_bytes();
        assert_eq!(char_boundary(text, 2), 1);
        assert_eq!(char_boundary(text, 3), 3);
        assert_eq!(char_boundary(b"abc", 2), 2);
        assert_eq!(char_boundary(b"ab", 8), 2);
        // No whole character fits.
        assert_eq!(char_boundary("€".as_bytes(), 1), 1);
        // Invalid input is cut where asked.
        assert_eq!(char_boundary(&[b'a', 0xFF, b'b', 0xC3], 3), 3);
    }

    #[test]
    fn test_decode_text_lossy() {
        assert_eq!(decode_text("héllo".as_bytes()), "héllo");
        assert_eq!(decode_text(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }
}

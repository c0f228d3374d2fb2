//! Decoded output frame.
//!
//! A [`Frame`] is one attributed line of container output. It is produced
//! once per decoded line and never mutated afterwards.
//!
//! # Example
//!
//! ```
//! use dockwire_client::protocol::{Frame, Stream};
//!
//! let frame = Frame::new("hello", 5, Stream::StdOut);
//! assert_eq!(frame.text(), "hello");
//! assert!(frame.is_stdout());
//! ```

use serde::{Deserialize, Serialize};

use super::wire_format::{Header, Stream, HEADER_SIZE};

/// One decoded line of container output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Line text, terminator stripped.
    pub text: String,
    /// Declared payload length (framed) or bytes consumed (raw).
    pub length: usize,
    /// Stream the line is attributed to.
    pub stream: Stream,
}

impl Frame {
    /// Create a new frame.
    pub fn new(text: impl Into<String>, length: usize, stream: Stream) -> Self {
        Self {
            text: text.into(),
            length,
            stream,
        }
    }

    /// Get the line text.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the frame is attributed to stdout.
    #[inline]
    pub fn is_stdout(&self) -> bool {
        self.stream == Stream::StdOut
    }

    /// Whether the frame is attributed to stderr.
    #[inline]
    pub fn is_stderr(&self) -> bool {
        self.stream == Stream::StdErr
    }

    /// Whether the frame came from an unframed (TTY) session that could not
    /// be attributed.
    #[inline]
    pub fn is_unattributed(&self) -> bool {
        self.stream == Stream::Unknown
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.stream, self.text)
    }
}

/// Build a multiplexed chunk (header + payload) as the engine would send it.
///
/// # Example
///
/// ```
/// use dockwire_client::protocol::{build_chunk, Stream};
///
/// let bytes = build_chunk(Stream::StdOut, b"hello");
/// assert_eq!(bytes, [1, 0, 0, 0, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
/// ```
pub fn build_chunk(stream: Stream, payload: &[u8]) -> Vec<u8> {
    let header = Header::new(stream, payload.len() as u32);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

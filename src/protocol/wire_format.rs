//! Wire format encoding and decoding.
//!
//! Implements the 8-byte header the engine puts in front of every
//! multiplexed log/attach chunk:
//! ```text
//! ┌──────────┬──────────┬──────────┐
//! │ Stream   │ Reserved │ Length   │
//! │ 1 byte   │ 3 bytes  │ 4 bytes  │
//! │ 0/1/2    │ zero     │ uint32 BE│
//! └──────────┴──────────┴──────────┘
//! ```
//!
//! When the container was started with a TTY, no header is sent at all and
//! the body is plain text. The first byte of a chunk is therefore both the
//! stream tag and the only hint that framing is present.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Number of reserved bytes between the stream tag and the length.
pub const RESERVED_SIZE: usize = 3;

/// Default maximum payload size (64 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Stream tag for stdin.
pub const STDIN_TAG: u8 = 0;

/// Stream tag for stdout.
pub const STDOUT_TAG: u8 = 1;

/// Stream tag for stderr.
pub const STDERR_TAG: u8 = 2;

/// Output channel a frame is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    /// Standard input (echoed back by attach).
    StdIn,
    /// Standard output.
    StdOut,
    /// Standard error.
    StdErr,
    /// Attribution impossible: the chunk carried no stream tag.
    Unknown,
}

impl Stream {
    /// Map a header tag to its stream.
    ///
    /// Returns `None` for any byte outside `{0, 1, 2}`, which is how an
    /// unframed (TTY) chunk is recognized.
    ///
    /// # Example
    ///
    /// ```
    /// use dockwire_client::protocol::Stream;
    ///
    /// assert_eq!(Stream::from_tag(1), Some(Stream::StdOut));
    /// assert_eq!(Stream::from_tag(b'h'), None);
    /// ```
    #[inline]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            STDIN_TAG => Some(Stream::StdIn),
            STDOUT_TAG => Some(Stream::StdOut),
            STDERR_TAG => Some(Stream::StdErr),
            _ => None,
        }
    }

    /// Header tag for this stream, `None` for `Unknown`.
    #[inline]
    pub fn tag(&self) -> Option<u8> {
        match self {
            Stream::StdIn => Some(STDIN_TAG),
            Stream::StdOut => Some(STDOUT_TAG),
            Stream::StdErr => Some(STDERR_TAG),
            Stream::Unknown => None,
        }
    }

    /// Lowercase name, as used by the engine's query parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::StdIn => "stdin",
            Stream::StdOut => "stdout",
            Stream::StdErr => "stderr",
            Stream::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded multiplexing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Stream the payload belongs to (never `Unknown`).
    pub stream: Stream,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(stream: Stream, payload_length: u32) -> Self {
        Self {
            stream,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian length, zeroed reserved bytes).
    ///
    /// `Unknown` has no tag on the wire; it is encoded as stdout.
    ///
    /// # Example
    ///
    /// ```
    /// use dockwire_client::protocol::{Header, Stream};
    ///
    /// let bytes = Header::new(Stream::StdErr, 5).encode();
    /// assert_eq!(bytes, [2, 0, 0, 0, 0, 0, 0, 5]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.stream.tag().unwrap_or(STDOUT_TAG);
        buf[4..8].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode a full 8-byte header.
    ///
    /// Returns `None` if the buffer is too short or the tag is not a
    /// stream tag.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let stream = Stream::from_tag(buf[0])?;
        Some(Self::from_tail(stream, &buf[1..HEADER_SIZE]))
    }

    /// Build a header from an already-classified tag and the 7 bytes that
    /// follow it on the wire.
    ///
    /// The three reserved bytes are skipped; the last four are the length.
    pub fn from_tail(stream: Stream, tail: &[u8]) -> Self {
        debug_assert!(tail.len() >= HEADER_SIZE - 1);
        let len = &tail[RESERVED_SIZE..RESERVED_SIZE + 4];
        Self {
            stream,
            payload_length: u32::from_be_bytes([len[0], len[1], len[2], len[3]]),
        }
    }

    /// Validate the payload length against a maximum.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(EngineError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }
        Ok(())
    }
}

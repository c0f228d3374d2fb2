//! Byte channel abstraction consumed by the demultiplexer.
//!
//! The demultiplexer never touches sockets directly. It pulls bytes through
//! [`ByteChannel`], which [`ChannelReader`] implements over any
//! `tokio::io::AsyncRead` (an HTTP response body, a Unix socket, or an
//! in-memory reader in tests).
//!
//! # Example
//!
//! ```
//! use dockwire_client::transport::{ByteChannel, ChannelReader};
//!
//! # tokio_test_block_on(async {
//! let mut channel = ChannelReader::new(&b"ab\ncd"[..]);
//! assert_eq!(channel.read_byte().await.unwrap(), b'a');
//! let line = channel.read_line(None).await.unwrap().unwrap();
//! assert_eq!(line.text, "b");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::future::Future;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{EngineError, Result};
use crate::protocol::{char_boundary, decode_text, scan_line, LineScan};

/// Default number of bytes requested from the reader per fill.
pub const DEFAULT_READ_SIZE: usize = 8 * 1024;

/// A line read from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Decoded text without terminator.
    pub text: String,
    /// Bytes taken from the channel, terminator included.
    pub consumed: usize,
}

/// A live, byte-oriented input channel.
///
/// Reads suspend until data arrives or the channel closes. A read that
/// cannot be satisfied because the channel closed fails with
/// [`EngineError::Truncated`].
pub trait ByteChannel {
    /// Whether no byte will ever be readable again.
    ///
    /// May wait for the peer when nothing is buffered.
    fn is_closed_for_read(&mut self) -> impl Future<Output = Result<bool>> + Send;

    /// Number of bytes readable without waiting.
    fn available_for_read(&self) -> usize;

    /// Read a single byte.
    fn read_byte(&mut self) -> impl Future<Output = Result<u8>> + Send;

    /// Read exactly `n` bytes.
    fn read_exact(&mut self, n: usize) -> impl Future<Output = Result<Bytes>> + Send;

    /// Read up to and including the next line terminator.
    ///
    /// Returns `None` when the channel is closed with nothing buffered. At
    /// end of data a trailing unterminated line is returned as-is. When
    /// `max` is set, a line longer than `max` bytes is returned in pieces,
    /// each ending on a UTF-8 character boundary where possible.
    ///
    /// A buffered line ending in a lone `\r` is held until the next byte
    /// arrives (or the channel closes), since that byte may be the `\n` of
    /// a `\r\n`. On a followed stream, progress output that redraws with
    /// `\r` therefore surfaces one update late.
    fn read_line(
        &mut self,
        max: Option<usize>,
    ) -> impl Future<Output = Result<Option<Line>>> + Send;

    /// Put a byte back at the front of the channel.
    fn unread_byte(&mut self, byte: u8);
}

/// Buffered [`ByteChannel`] over an `AsyncRead`.
pub struct ChannelReader<R> {
    reader: R,
    buffer: BytesMut,
    eof: bool,
    read_size: usize,
}

impl<R: AsyncRead + Unpin + Send> ChannelReader<R> {
    /// Wrap a reader with the default read size.
    pub fn new(reader: R) -> Self {
        Self::with_read_size(reader, DEFAULT_READ_SIZE)
    }

    /// Wrap a reader, requesting `read_size` bytes per fill.
    pub fn with_read_size(reader: R, read_size: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(read_size),
            eof: false,
            read_size: read_size.max(1),
        }
    }

    /// Pull one read's worth of bytes into the buffer.
    ///
    /// Returns the number of bytes added; 0 means end of data.
    async fn fill(&mut self) -> Result<usize> {
        if self.eof {
            return Ok(0);
        }
        self.buffer.reserve(self.read_size);
        let n = self.reader.read_buf(&mut self.buffer).await?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    fn take_line(&mut self, content: usize, consumed: usize) -> Line {
        let raw = self.buffer.split_to(consumed);
        Line {
            text: decode_text(&raw[..content]),
            consumed,
        }
    }
}

impl<R: AsyncRead + Unpin + Send> ByteChannel for ChannelReader<R> {
    async fn is_closed_for_read(&mut self) -> Result<bool> {
        if !self.buffer.is_empty() {
            return Ok(false);
        }
        Ok(self.fill().await? == 0)
    }

    fn available_for_read(&self) -> usize {
        self.buffer.len()
    }

    async fn read_byte(&mut self) -> Result<u8> {
        if self.buffer.is_empty() && self.fill().await? == 0 {
            return Err(EngineError::Truncated {
                expected: 1,
                actual: 0,
            });
        }
        Ok(self.buffer.get_u8())
    }

    async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        while self.buffer.len() < n {
            if self.fill().await? == 0 {
                return Err(EngineError::Truncated {
                    expected: n,
                    actual: self.buffer.len(),
                });
            }
        }
        Ok(self.buffer.split_to(n).freeze())
    }

    async fn read_line(&mut self, max: Option<usize>) -> Result<Option<Line>> {
        let limit = max.filter(|&m| m > 0).unwrap_or(usize::MAX);

        loop {
            match scan_line(&self.buffer) {
                LineScan::Complete { content, consumed } if content <= limit => {
                    return Ok(Some(self.take_line(content, consumed)));
                }
                LineScan::PendingCr { content } if content <= limit && self.eof => {
                    return Ok(Some(self.take_line(content, content + 1)));
                }
                LineScan::Incomplete if self.eof && self.buffer.len() < limit => {
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    let len = self.buffer.len();
                    return Ok(Some(self.take_line(len, len)));
                }
                LineScan::Complete { content, .. } | LineScan::PendingCr { content }
                    if content > limit =>
                {
                    let split = char_boundary(&self.buffer, limit);
                    return Ok(Some(self.take_line(split, split)));
                }
                LineScan::Incomplete if self.buffer.len() >= limit => {
                    let split = char_boundary(&self.buffer, limit);
                    return Ok(Some(self.take_line(split, split)));
                }
                _ => {
                    self.fill().await?;
                }
            }
        }
    }

    fn unread_byte(&mut self, byte: u8) {
        let mut buffer = BytesMut::with_capacity(self.buffer.len() + 1 + self.read_size);
        buffer.put_u8(byte);
        buffer.extend_from_slice(&self.buffer);
        self.buffer = buffer;
    }
}

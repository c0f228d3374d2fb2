//! Log/attach stream demultiplexer.
//!
//! Turns the body of a logs or attach call into a lazy sequence of
//! [`Frame`]s. Two wire formats share the endpoint:
//!
//! - **Framed**: every chunk starts with an 8-byte header whose first byte is
//!   the stream tag (0, 1 or 2).
//! - **Raw**: the container has a TTY, so the engine sends plain text with no
//!   header at all.
//!
//! The first byte of a chunk decides. A byte outside `{0, 1, 2}` is text: it
//! is put back in front of the channel and a line is read. By default the
//! decision made on the first chunk holds for the whole session.
//!
//! # Example
//!
//! ```
//! use dockwire_client::demux::Demultiplexer;
//! use dockwire_client::options::RequestedOutputs;
//! use dockwire_client::protocol::{build_chunk, Stream};
//! use dockwire_client::transport::ChannelReader;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let bytes = build_chunk(Stream::StdOut, b"hello");
//! let mut demux = Demultiplexer::new(ChannelReader::new(&bytes[..]), RequestedOutputs::BOTH);
//!
//! let frame = demux.next_frame().await.unwrap().unwrap();
//! assert_eq!(frame.text, "hello");
//! assert_eq!(frame.stream, Stream::StdOut);
//! assert!(demux.next_frame().await.unwrap().is_none());
//! # });
//! ```

use futures::stream::{self, Stream as FuturesStream};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::options::RequestedOutputs;
use crate::protocol::{
    decode_text, first_line, Frame, Header, Stream, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE,
};
use crate::transport::ByteChannel;

/// Default cap on a single raw line before it is emitted in pieces (1 MiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// How often the framed/raw decision is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeDetection {
    /// Decide on the first chunk and keep that mode for the session.
    #[default]
    Latched,
    /// Re-inspect the first byte of every chunk.
    PerChunk,
}

/// Decode mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Nothing read yet.
    Undetermined,
    /// Multiplexed chunks with 8-byte headers.
    Framed,
    /// Unframed TTY text.
    Raw,
}

/// Demultiplexer tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Framed/raw detection policy.
    pub detection: ModeDetection,
    /// Largest accepted framed payload.
    pub max_payload_size: u32,
    /// Longest raw line kept in one frame.
    pub max_line_length: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            detection: ModeDetection::Latched,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Per-session demultiplexer over a [`ByteChannel`].
///
/// Holds only the channel, the requested outputs and the decode mode.
/// Frames are produced on demand by [`next_frame`](Self::next_frame).
pub struct Demultiplexer<C> {
    channel: C,
    outputs: RequestedOutputs,
    config: DemuxConfig,
    mode: DecodeMode,
    frames_decoded: u64,
}

impl<C: ByteChannel + Send> Demultiplexer<C> {
    /// Create a demultiplexer with the default configuration.
    pub fn new(channel: C, outputs: RequestedOutputs) -> Self {
        Self::with_config(channel, outputs, DemuxConfig::default())
    }

    /// Create a demultiplexer with a custom configuration.
    pub fn with_config(channel: C, outputs: RequestedOutputs, config: DemuxConfig) -> Self {
        Self {
            channel,
            outputs,
            config,
            mode: DecodeMode::Undetermined,
            frames_decoded: 0,
        }
    }

    /// Current decode mode.
    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Number of frames produced so far.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Decode the next frame.
    ///
    /// Returns `Ok(None)` once the channel is closed. An error is fatal to
    /// the session.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.channel.is_closed_for_read().await? {
            tracing::debug!(frames = self.frames_decoded, "Log stream closed");
            return Ok(None);
        }

        let frame = if self.mode == DecodeMode::Raw
            && self.config.detection == ModeDetection::Latched
        {
            self.read_raw().await?
        } else {
            let first = self.channel.read_byte().await?;
            match Stream::from_tag(first) {
                Some(stream) => {
                    self.enter(DecodeMode::Framed);
                    Some(self.read_framed(stream).await?)
                }
                None => {
                    if self.mode == DecodeMode::Framed
                        && self.config.detection == ModeDetection::Latched
                    {
                        return Err(EngineError::Protocol(format!(
                            "unexpected stream tag 0x{first:02x} in multiplexed stream"
                        )));
                    }
                    self.enter(DecodeMode::Raw);
                    self.channel.unread_byte(first);
                    self.read_raw().await?
                }
            }
        };

        if let Some(frame) = &frame {
            self.frames_decoded += 1;
            tracing::trace!(stream = %frame.stream, length = frame.length, "Decoded frame");
        }
        Ok(frame)
    }

    /// Turn the demultiplexer into a lazy `futures::Stream`.
    ///
    /// The stream ends after the channel closes or after the first error.
    pub fn into_stream(self) -> impl FuturesStream<Item = Result<Frame>> + Send {
        stream::try_unfold(self, |mut demux| async move {
            Ok(demux.next_frame().await?.map(|frame| (frame, demux)))
        })
    }

    async fn read_framed(&mut self, stream: Stream) -> Result<Frame> {
        let tail = self.channel.read_exact(HEADER_SIZE - 1).await?;
        let header = Header::from_tail(stream, &tail);
        header.validate(self.config.max_payload_size)?;

        let length = header.payload_length as usize;
        let payload = self.channel.read_exact(length).await?;
        // Text stops at the first terminator; `length` still covers the payload.
        Ok(Frame::new(
            decode_text(first_line(&payload)),
            length,
            header.stream,
        ))
    }

    async fn read_raw(&mut self) -> Result<Option<Frame>> {
        let line = self
            .channel
            .read_line(Some(self.config.max_line_length))
            .await?;
        Ok(line.map(|line| Frame::new(line.text, line.consumed, self.outputs.attribution())))
    }

    fn enter(&mut self, mode: DecodeMode) {
        if self.mode != mode {
            tracing::debug!(from = ?self.mode, to = ?mode, "Log stream mode detected");
            self.mode = mode;
        }
    }
}

/// Demultiplex a channel into a lazy stream of frames.
///
/// Shorthand for `Demultiplexer::new(channel, outputs).into_stream()`.
pub fn demultiplex<C>(
    channel: C,
    outputs: RequestedOutputs,
) -> impl FuturesStream<Item = Result<Frame>> + Send
where
    C: ByteChannel + Send,
{
    Demultiplexer::new(channel, outputs).into_stream()
}

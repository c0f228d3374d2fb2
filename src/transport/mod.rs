//! Transport module - byte channels and engine connections.
//!
//! Provides:
//! - [`ByteChannel`], the only interface the demultiplexer reads from
//! - [`ChannelReader`], a buffered channel over any `AsyncRead`
//! - Unix socket / TCP connection and HTTP/1.1 request plumbing

mod channel;
mod connection;

pub use channel::{ByteChannel, ChannelReader, Line, DEFAULT_READ_SIZE};
pub use connection::{
    body_reader, send_request, BodyReader, EngineHost, DEFAULT_UNIX_SOCKET, DOCKER_HOST_ENV,
};

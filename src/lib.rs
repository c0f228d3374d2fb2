//! # dockwire-client
//!
//! Rust client for the streaming endpoints of the container engine API
//! (`/containers/{id}/logs` and `/containers/{id}/attach`).
//!
//! ## Architecture
//!
//! - **Transport**: one HTTP/1.1 connection per session over a Unix socket
//!   or TCP, body exposed as a [`ByteChannel`](transport::ByteChannel)
//! - **Demultiplexer**: turns the channel into [`Frame`]s, handling both the
//!   8-byte-header multiplexed format and raw TTY text
//!
//! ## Example
//!
//! ```no_run
//! use dockwire_client::{EngineClient, LogsOptions};
//! use futures::TryStreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dockwire_client::EngineError> {
//!     let client = EngineClient::from_env()?;
//!     let logs = client.containers().logs("web", &LogsOptions::new()).await?;
//!
//!     let frames = logs.into_stream();
//!     futures::pin_mut!(frames);
//!     while let Some(frame) = frames.try_next().await? {
//!         println!("{} {}", frame.stream, frame.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod demux;
pub mod error;
pub mod options;
pub mod protocol;
pub mod transport;

mod client;

pub use client::{
    ContainerLogs, EngineClient, EngineClientBuilder, LogStream, DEFAULT_CONNECT_TIMEOUT,
    MULTIPLEXED_CONTENT_TYPE,
};
pub use demux::{demultiplex, DecodeMode, DemuxConfig, Demultiplexer, ModeDetection};
pub use error::{EngineError, Result};
pub use options::{AttachOptions, LogsOptions, RequestedOutputs};
pub use protocol::{Frame, Stream};

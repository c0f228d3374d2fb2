//! Engine client and its builder.
//!
//! The [`EngineClientBuilder`] provides a fluent API for configuring the
//! engine connection. The [`EngineClient`] opens one connection per
//! streaming call:
//! 1. Build the request path and query
//! 2. Connect (Unix socket or TCP) and send the request
//! 3. Map non-success statuses to errors
//! 4. Hand the response body to a [`Demultiplexer`]
//!
//! # Example
//!
//! ```no_run
//! use dockwire_client::{EngineClient, LogsOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EngineClient::builder()
//!         .host("unix:///var/run/docker.sock".parse()?)
//!         .api_version("1.43")
//!         .build()?;
//!
//!     let mut logs = client
//!         .containers()
//!         .logs("web", &LogsOptions::new().tail(100))
//!         .await?;
//!
//!     while let Some(frame) = logs.next_frame().await? {
//!         println!("{frame}");
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use bytes::Bytes;
use futures::Stream as FuturesStream;
use http_body_util::{BodyExt, Empty};
use hyper::header::{CONTENT_TYPE, HOST, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use serde::Deserialize;

use crate::demux::{DecodeMode, DemuxConfig, Demultiplexer};
use crate::error::{EngineError, Result};
use crate::options::{AttachOptions, LogsOptions, RequestedOutputs};
use crate::protocol::Frame;
use crate::transport::{body_reader, send_request, BodyReader, ChannelReader, EngineHost};

/// Default time allowed for connecting and the HTTP handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Content type the engine uses for multiplexed (non-TTY) output.
pub const MULTIPLEXED_CONTENT_TYPE: &str = "application/vnd.docker.multiplexed-stream";

const CLIENT_USER_AGENT: &str = concat!("dockwire-client/", env!("CARGO_PKG_VERSION"));

/// Builder for configuring and creating an [`EngineClient`].
#[derive(Debug, Clone)]
pub struct EngineClientBuilder {
    host: Option<EngineHost>,
    api_version: Option<String>,
    connect_timeout: Duration,
    demux_config: DemuxConfig,
}

impl EngineClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            host: None,
            api_version: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            demux_config: DemuxConfig::default(),
        }
    }

    /// Set the engine host.
    ///
    /// Default: `DOCKER_HOST`, else `unix:///var/run/docker.sock`
    pub fn host(mut self, host: EngineHost) -> Self {
        self.host = Some(host);
        self
    }

    /// Pin the API version, e.g. `1.43`.
    ///
    /// Default: unversioned paths (the engine picks its own version)
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the connect and handshake timeout.
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the demultiplexer configuration used for every stream.
    pub fn demux_config(mut self, config: DemuxConfig) -> Self {
        self.demux_config = config;
        self
    }

    /// Build the client.
    ///
    /// Fails if no host was set and `DOCKER_HOST` holds an invalid value.
    pub fn build(self) -> Result<EngineClient> {
        let host = match self.host {
            Some(host) => host,
            None => EngineHost::from_env()?,
        };

        let api_version = self
            .api_version
            .map(|v| v.trim_start_matches('v').to_string());
        if let Some(version) = &api_version {
            if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return Err(EngineError::InvalidOptions(format!(
                    "invalid API version: {version:?}"
                )));
            }
        }

        tracing::debug!(%host, ?api_version, "Engine client configured");

        Ok(EngineClient {
            host,
            api_version,
            connect_timeout: self.connect_timeout,
            demux_config: self.demux_config,
        })
    }
}

impl Default for EngineClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for the container engine API.
///
/// Cheap to clone; holds configuration only.
#[derive(Debug, Clone)]
pub struct EngineClient {
    host: EngineHost,
    api_version: Option<String>,
    connect_timeout: Duration,
    demux_config: DemuxConfig,
}

impl EngineClient {
    /// Create a new client builder.
    pub fn builder() -> EngineClientBuilder {
        EngineClientBuilder::new()
    }

    /// Client for the host named by `DOCKER_HOST` (or the default socket).
    pub fn from_env() -> Result<Self> {
        EngineClientBuilder::new().build()
    }

    /// Engine this client connects to.
    pub fn host(&self) -> &EngineHost {
        &self.host
    }

    /// Pinned API version without the `v` prefix, if any.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Container streaming endpoints.
    pub fn containers(&self) -> ContainerLogs<'_> {
        ContainerLogs { client: self }
    }

    /// Origin-form request target for a container endpoint.
    fn container_path(&self, id: &str, action: &str, query: &str) -> Result<String> {
        validate_container_id(id)?;
        let prefix = match &self.api_version {
            Some(version) => format!("/v{version}"),
            None => String::new(),
        };
        Ok(format!("{prefix}/containers/{id}/{action}?{query}"))
    }

    async fn open_stream(
        &self,
        method: Method,
        id: &str,
        path: String,
        outputs: RequestedOutputs,
    ) -> Result<LogStream> {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, self.host.authority())
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(Empty::<Bytes>::new())?;

        let response = send_request(&self.host, request, self.connect_timeout).await?;
        let status = response.status();

        if !streams_body(status) {
            let body = response.into_body().collect().await?.to_bytes();
            return Err(status_error(status, id, &body));
        }

        let multiplexed = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with(MULTIPLEXED_CONTENT_TYPE));
        tracing::debug!(container = id, %status, ?multiplexed, "Log stream opened");

        let channel = ChannelReader::new(body_reader(response.into_body()));
        Ok(LogStream {
            demux: Demultiplexer::with_config(channel, outputs, self.demux_config.clone()),
        })
    }
}

/// Streaming container endpoints, obtained from [`EngineClient::containers`].
pub struct ContainerLogs<'a> {
    client: &'a EngineClient,
}

impl ContainerLogs<'_> {
    /// Stream a container's logs (`GET /containers/{id}/logs`).
    pub async fn logs(&self, id: &str, options: &LogsOptions) -> Result<LogStream> {
        options.validate()?;
        let path = self.client.container_path(id, "logs", &options.query())?;
        self.client
            .open_stream(Method::GET, id, path, options.requested_outputs())
            .await
    }

    /// Attach to a running container's output (`POST /containers/{id}/attach`).
    pub async fn attach(&self, id: &str, options: &AttachOptions) -> Result<LogStream> {
        let path = self.client.container_path(id, "attach", &options.query())?;
        self.client
            .open_stream(Method::POST, id, path, options.requested_outputs())
            .await
    }
}

/// A live log or attach session.
///
/// Dropping it closes the connection.
pub struct LogStream {
    demux: Demultiplexer<ChannelReader<BodyReader>>,
}

impl LogStream {
    /// Next decoded frame; `None` once the engine ends the stream.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.demux.next_frame().await
    }

    /// Decode mode detected so far.
    pub fn mode(&self) -> DecodeMode {
        self.demux.mode()
    }

    /// Turn the session into a `futures::Stream` of frames.
    pub fn into_stream(self) -> impl FuturesStream<Item = Result<Frame>> + Send {
        self.demux.into_stream()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Statuses whose response body carries the log stream.
///
/// A `101` would need `hyper::upgrade::on` to read, and no upgrade is ever
/// requested, so it is treated as a failure.
fn streams_body(status: StatusCode) -> bool {
    status.is_success()
}

fn status_error(status: StatusCode, id: &str, body: &[u8]) -> EngineError {
    if status == StatusCode::NOT_FOUND {
        return EngineError::ContainerNotFound { id: id.to_string() };
    }

    let message = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(err) => err.message,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    };
    tracing::warn!(status = status.as_u16(), %message, "Engine request failed");
    EngineError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Ids and names are restricted to `[A-Za-z0-9_.-]`, optionally with a
/// leading `/`, so they can go into the path unescaped.
fn validate_container_id(id: &str) -> Result<()> {
    let name = id.strip_prefix('/').unwrap_or(id);
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidOptions(format!(
            "invalid container id: {id:?}"
        )))
    }
}

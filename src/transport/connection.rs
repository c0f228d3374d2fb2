//! Engine connection: host parsing, socket connect and HTTP/1.1 exchange.
//!
//! - Unix: Unix Domain Socket (`unix:///var/run/docker.sock`)
//! - TCP: plain TCP (`tcp://127.0.0.1:2375`)
//!
//! Every streaming call opens its own connection. The hyper connection
//! driver runs as a spawned task and finishes once the response body is
//! dropped or the engine closes the socket.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use http_body_util::{BodyDataStream, Empty};
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::io::StreamReader;

use crate::error::{EngineError, Result};

/// Default engine socket path.
pub const DEFAULT_UNIX_SOCKET: &str = "/var/run/docker.sock";

/// Environment variable that overrides the engine host.
pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";

/// Response body adapted to `AsyncRead`.
pub type BodyReader = StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>;

/// Where the engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineHost {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// `host:port` for plain TCP.
    Tcp(String),
}

impl EngineHost {
    /// Parse a host string.
    ///
    /// Accepts `unix:///path`, `tcp://host:port`, `http://host:port` and bare
    /// absolute socket paths.
    ///
    /// # Example
    ///
    /// ```
    /// use dockwire_client::transport::EngineHost;
    ///
    /// let host = EngineHost::parse("tcp://127.0.0.1:2375").unwrap();
    /// assert_eq!(host, EngineHost::Tcp("127.0.0.1:2375".to_string()));
    /// ```
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();

        if let Some(path) = value.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(EngineError::InvalidHost(value.to_string()));
            }
            return Ok(EngineHost::Unix(PathBuf::from(path)));
        }

        if let Some(addr) = value
            .strip_prefix("tcp://")
            .or_else(|| value.strip_prefix("http://"))
        {
            let addr = addr.trim_end_matches('/');
            if addr.is_empty() || !addr.contains(':') {
                return Err(EngineError::InvalidHost(value.to_string()));
            }
            return Ok(EngineHost::Tcp(addr.to_string()));
        }

        if value.starts_with('/') {
            return Ok(EngineHost::Unix(PathBuf::from(value)));
        }

        Err(EngineError::InvalidHost(value.to_string()))
    }

    /// Host from `DOCKER_HOST`, falling back to the default socket.
    pub fn from_env() -> Result<Self> {
        match std::env::var(DOCKER_HOST_ENV) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value),
            _ => Ok(Self::default()),
        }
    }

    /// Value for the HTTP `Host` header.
    pub fn authority(&self) -> &str {
        match self {
            EngineHost::Unix(_) => "localhost",
            EngineHost::Tcp(addr) => addr,
        }
    }
}

impl Default for EngineHost {
    fn default() -> Self {
        EngineHost::Unix(PathBuf::from(DEFAULT_UNIX_SOCKET))
    }
}

impl FromStr for EngineHost {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for EngineHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineHost::Unix(path) => write!(f, "unix://{}", path.display()),
            EngineHost::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Connect to the engine and send a single request.
///
/// `connect_timeout` bounds the socket connect and the HTTP handshake; the
/// response itself may take as long as the engine likes (follow mode).
pub async fn send_request(
    host: &EngineHost,
    request: Request<Empty<Bytes>>,
    connect_timeout: Duration,
) -> Result<Response<Incoming>> {
    match host {
        EngineHost::Unix(path) => {
            #[cfg(unix)]
            {
                let stream = with_timeout(connect_timeout, async {
                    tokio::net::UnixStream::connect(path)
                        .await
                        .map_err(EngineError::from)
                })
                .await?;
                exchange(stream, request, connect_timeout).await
            }

            #[cfg(not(unix))]
            {
                let _ = (request, connect_timeout);
                Err(EngineError::InvalidHost(format!(
                    "unix sockets are not supported on this platform: {}",
                    path.display()
                )))
            }
        }
        EngineHost::Tcp(addr) => {
            let stream = with_timeout(connect_timeout, async {
                TcpStream::connect(addr.as_str())
                    .await
                    .map_err(EngineError::from)
            })
            .await?;
            exchange(stream, request, connect_timeout).await
        }
    }
}

/// Adapt a response body into an `AsyncRead`.
pub fn body_reader(body: Incoming) -> BodyReader {
    let data = BodyDataStream::new(body).map_err(io::Error::other);
    StreamReader::new(data.boxed())
}

async fn exchange<S>(
    stream: S,
    request: Request<Empty<Bytes>>,
    connect_timeout: Duration,
) -> Result<Response<Incoming>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);

    let (mut sender, conn) = with_timeout(connect_timeout, async {
        hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(io)
            .await
            .map_err(EngineError::from)
    })
    .await?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("Engine connection closed: {}", e);
        }
    });

    tracing::debug!(method = %request.method(), uri = %request.uri(), "Sending engine request");
    Ok(sender.send_request(request).await?)
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| EngineError::Timeout(limit))?
}

//! Integration tests for dockwire-client.
//!
//! These tests drive the demultiplexer through the public API and run the
//! client against a fake engine listening on a Unix socket.

use bytes::Bytes;
use dockwire_client::protocol::{build_chunk, Stream};
use dockwire_client::transport::ChannelReader;
use dockwire_client::{demultiplex, Frame, RequestedOutputs};
use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Channel that hands out the given chunks one read at a time.
fn chunked(chunks: Vec<Vec<u8>>) -> ChannelReader<impl AsyncRead + Unpin + Send + 'static> {
    let items: Vec<std::io::Result<Bytes>> =
        chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
    ChannelReader::new(StreamReader::new(futures::stream::iter(items)))
}

async fn decode(chunks: Vec<Vec<u8>>, outputs: RequestedOutputs) -> Vec<Frame> {
    demultiplex(chunked(chunks), outputs)
        .try_collect()
        .await
        .unwrap()
}

/// Interleaved stdout/stderr output, one chunk per engine write.
#[tokio::test]
async fn test_interleaved_multiplexed_output() {
    let chunks = vec![
        build_chunk(Stream::StdOut, b"starting server\n"),
        build_chunk(Stream::StdErr, b"warning: no config file\n"),
        build_chunk(Stream::StdOut, b"listening on :8080\n"),
    ];

    let frames = decode(chunks, RequestedOutputs::BOTH).await;
    assert_eq!(
        frames,
        vec![
            Frame::new("starting server", 16, Stream::StdOut),
            Frame::new("warning: no config file", 24, Stream::StdErr),
            Frame::new("listening on :8080", 19, Stream::StdOut),
        ]
    );
}

/// Headers split between reads must not change the result.
#[tokio::test]
async fn test_chunk_boundaries_do_not_matter() {
    let mut bytes = Vec::new();
    for i in 0..20 {
        let stream = if i % 3 == 0 { Stream::StdErr } else { Stream::StdOut };
        bytes.extend(build_chunk(stream, format!("line {i}\n").as_bytes()));
    }

    let whole = decode(vec![bytes.clone()], RequestedOutputs::BOTH).await;
    for size in [1, 5, 8, 13] {
        let pieces: Vec<Vec<u8>> = bytes.chunks(size).map(|c| c.to_vec()).collect();
        assert_eq!(decode(pieces, RequestedOutputs::BOTH).await, whole);
    }
    assert_eq!(whole.len(), 20);
    assert_eq!(whole[19].text, "line 19");
}

/// Two sessions over identical input yield identical frames.
#[tokio::test]
async fn test_sessions_are_independent() {
    let input = vec![b"first\r\nsecond\n".to_vec()];
    let a = decode(input.clone(), RequestedOutputs::STDOUT).await;
    let b = decode(input, RequestedOutputs::STDOUT).await;
    assert_eq!(a, b);
    assert_eq!(a[0], Frame::new("first", 7, Stream::StdOut));
}

/// TTY output keeps its first character and carriage-return progress lines.
#[tokio::test]
async fn test_tty_output() {
    let chunks = vec![
        b"Downloading 10%\r".to_vec(),
        b"Downloading 100%\r\n".to_vec(),
        b"done".to_vec(),
    ];

    let frames = decode(chunks, RequestedOutputs::BOTH).await;
    let texts: Vec<&str> = frames.iter().map(|f| f.text()).collect();
    assert_eq!(texts, ["Downloading 10%", "Downloading 100%", "done"]);
    assert!(frames.iter().all(Frame::is_unattributed));
}

#[cfg(unix)]
mod engine {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dockwire_client::protocol::{build_chunk, Stream};
    use dockwire_client::transport::EngineHost;
    use dockwire_client::{
        AttachOptions, DecodeMode, EngineClient, EngineError, Frame, LogsOptions,
    };
    use futures::TryStreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;
    use tokio::task::JoinHandle;

    static NEXT_SOCKET: AtomicUsize = AtomicUsize::new(0);

    fn socket_path() -> PathBuf {
        let n = NEXT_SOCKET.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("dockwire-test-{}-{}.sock", std::process::id(), n))
    }

    /// Serve a single connection with a canned response.
    ///
    /// Returns the socket path and a handle resolving to the request head.
    fn fake_engine(response: Vec<u8>) -> (PathBuf, JoinHandle<String>) {
        let path = socket_path();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            stream.write_all(&response).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8(head).unwrap()
        });

        (path, handle)
    }

    fn streaming_response(content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n"
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    fn json_response(status: &str, body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
        .into_bytes()
    }

    fn client(path: &PathBuf) -> EngineClient {
        EngineClient::builder()
            .host(EngineHost::Unix(path.clone()))
            .api_version("1.43")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_logs_multiplexed() {
        let mut body = build_chunk(Stream::StdOut, b"hello\n");
        body.extend(build_chunk(Stream::StdErr, b"oops\n"));
        let (path, server) = fake_engine(streaming_response(
            "application/vnd.docker.multiplexed-stream",
            &body,
        ));

        let options = LogsOptions::new().follow(false).tail(2);
        let mut logs = client(&path)
            .containers()
            .logs("web", &options)
            .await
            .unwrap();

        assert_eq!(
            logs.next_frame().await.unwrap(),
            Some(Frame::new("hello", 6, Stream::StdOut))
        );
        assert_eq!(logs.mode(), DecodeMode::Framed);
        assert_eq!(
            logs.next_frame().await.unwrap(),
            Some(Frame::new("oops", 5, Stream::StdErr))
        );
        assert!(logs.next_frame().await.unwrap().is_none());

        let head = server.await.unwrap();
        assert!(head.starts_with(
            "GET /v1.43/containers/web/logs?follow=false&stdout=true&stderr=true&timestamps=false&tail=2 HTTP/1.1\r\n"
        ));
        assert!(head.to_ascii_lowercase().contains("host: localhost\r\n"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_logs_tty_stdout_only() {
        let (path, server) = fake_engine(streaming_response(
            "application/vnd.docker.raw-stream",
            b"$ ls\r\nREADME.md\r\n",
        ));

        let options = LogsOptions::new().stderr(false);
        let frames: Vec<Frame> = client(&path)
            .containers()
            .logs("tty-box", &options)
            .await
            .unwrap()
            .into_stream()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            frames,
            vec![
                Frame::new("$ ls", 6, Stream::StdOut),
                Frame::new("README.md", 11, Stream::StdOut),
            ]
        );
        server.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_attach_uses_post() {
        let body = build_chunk(Stream::StdOut, b"attached\n");
        let (path, server) = fake_engine(streaming_response(
            "application/vnd.docker.multiplexed-stream",
            &body,
        ));

        let mut stream = client(&path)
            .containers()
            .attach("web", &AttachOptions::new().logs(true))
            .await
            .unwrap();
        assert_eq!(stream.next_frame().await.unwrap().unwrap().text, "attached");

        let head = server.await.unwrap();
        assert!(head.starts_with(
            "POST /v1.43/containers/web/attach?stream=true&logs=true&stdin=false&stdout=true&stderr=true HTTP/1.1\r\n"
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_missing_container() {
        let (path, server) = fake_engine(json_response(
            "404 Not Found",
            r#"{"message":"No such container: ghost"}"#,
        ));

        let err = client(&path)
            .containers()
            .logs("ghost", &LogsOptions::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::ContainerNotFound { ref id } if id == "ghost"));
        server.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_engine_error_message() {
        let (path, server) = fake_engine(json_response(
            "409 Conflict",
            r#"{"message":"container web is not running"}"#,
        ));

        let err = client(&path)
            .containers()
            .attach("web", &AttachOptions::new())
            .await
            .err()
            .unwrap();
        match err {
            EngineError::Api { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "container web is not running");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let mut body = build_chunk(Stream::StdOut, b"complete\n");
        body.extend(&build_chunk(Stream::StdOut, b"cut off here\n")[..12]);
        let (path, server) = fake_engine(streaming_response(
            "application/vnd.docker.multiplexed-stream",
            &body,
        ));

        let mut logs = client(&path)
            .containers()
            .logs("web", &LogsOptions::new())
            .await
            .unwrap();
        assert_eq!(logs.next_frame().await.unwrap().unwrap().text, "complete");
        assert!(logs.next_frame().await.unwrap_err().is_truncation());
        server.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }
}

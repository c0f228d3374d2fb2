//! Follow Logs - stream a container's output to the terminal.
//!
//! This demo shows:
//! - Building an [`EngineClient`] from `DOCKER_HOST`
//! - Following logs with a tail
//! - Consuming frames through the `futures::Stream` adapter
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=dockwire_client=debug cargo run --example follow_logs -- my-container 20
//! ```

use dockwire_client::{EngineClient, LogsOptions, Stream};
use futures::TryStreamExt;

fn log_filter() -> tracing_subscriber::EnvFilter {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let container = args.next().ok_or("usage: follow_logs <container> [tail]")?;
    let tail: u64 = match args.next() {
        Some(n) => n.parse()?,
        None => 50,
    };

    let client = EngineClient::from_env()?;
    tracing::info!(host = %client.host(), %container, "Following logs");

    let options = LogsOptions::new().tail(tail).timestamps(true);
    let frames = client
        .containers()
        .logs(&container, &options)
        .await?
        .into_stream();
    futures::pin_mut!(frames);

    while let Some(frame) = frames.try_next().await? {
        match frame.stream {
            Stream::StdErr => eprintln!("{}", frame.text),
            _ => println!("{}", frame.text),
        }
    }

    tracing::info!("Log stream ended");
    Ok(())
}

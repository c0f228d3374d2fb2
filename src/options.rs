//! Options for the streaming container endpoints.
//!
//! [`LogsOptions`] and [`AttachOptions`] map one-to-one onto the query
//! parameters of `GET /containers/{id}/logs` and
//! `POST /containers/{id}/attach`. Both also tell the demultiplexer which
//! outputs were requested, which is the only clue it has for attributing
//! unframed (TTY) output.
//!
//! # Example
//!
//! ```
//! use dockwire_client::options::LogsOptions;
//!
//! let options = LogsOptions::new().follow(false).stderr(false).tail(10);
//! assert_eq!(
//!     options.query(),
//!     "follow=false&stdout=true&stderr=false&timestamps=false&tail=10"
//! );
//! ```

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::{EngineError, Result};
use crate::protocol::Stream;

/// Which outputs the caller asked the engine for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestedOutputs {
    /// Stdout was requested.
    pub stdout: bool,
    /// Stderr was requested.
    pub stderr: bool,
}

impl RequestedOutputs {
    /// Both stdout and stderr.
    pub const BOTH: Self = Self {
        stdout: true,
        stderr: true,
    };

    /// Only stdout.
    pub const STDOUT: Self = Self {
        stdout: true,
        stderr: false,
    };

    /// Only stderr.
    pub const STDERR: Self = Self {
        stdout: false,
        stderr: true,
    };

    /// Stream to attribute unframed output to.
    ///
    /// With exactly one output requested the answer is unambiguous;
    /// otherwise it is [`Stream::Unknown`].
    pub fn attribution(&self) -> Stream {
        match (self.stdout, self.stderr) {
            (true, false) => Stream::StdOut,
            (false, true) => Stream::StdErr,
            _ => Stream::Unknown,
        }
    }
}

/// Options for `GET /containers/{id}/logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsOptions {
    /// Keep the connection open and stream new output.
    pub follow: bool,
    /// Include stdout.
    pub stdout: bool,
    /// Include stderr.
    pub stderr: bool,
    /// Only output after this UNIX timestamp.
    pub since: Option<i64>,
    /// Only output before this UNIX timestamp.
    pub until: Option<i64>,
    /// Prefix every line with an RFC3339 timestamp.
    pub timestamps: bool,
    /// Number of lines from the end; `None` means all.
    pub tail: Option<u64>,
}

impl Default for LogsOptions {
    fn default() -> Self {
        Self {
            follow: true,
            stdout: true,
            stderr: true,
            since: None,
            until: None,
            timestamps: false,
            tail: None,
        }
    }
}

impl LogsOptions {
    /// Follow stdout and stderr.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the connection open for new output.
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Include stdout.
    pub fn stdout(mut self, stdout: bool) -> Self {
        self.stdout = stdout;
        self
    }

    /// Include stderr.
    pub fn stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    /// Only output after this UNIX timestamp.
    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    /// Only output before this UNIX timestamp.
    pub fn until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    /// Prefix every line with an RFC3339 timestamp.
    pub fn timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Only the last `lines` lines.
    pub fn tail(mut self, lines: u64) -> Self {
        self.tail = Some(lines);
        self
    }

    /// Outputs the demultiplexer should assume for unframed output.
    pub fn requested_outputs(&self) -> RequestedOutputs {
        RequestedOutputs {
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }

    /// The engine rejects a logs call that selects no output.
    pub fn validate(&self) -> Result<()> {
        if !self.stdout && !self.stderr {
            return Err(EngineError::InvalidOptions(
                "at least one of stdout or stderr must be requested".to_string(),
            ));
        }
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if until < since {
                return Err(EngineError::InvalidOptions(format!(
                    "until ({until}) is before since ({since})"
                )));
            }
        }
        Ok(())
    }

    /// Encode as a query string (without the leading `?`).
    pub fn query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("follow", bool_str(self.follow))
            .append_pair("stdout", bool_str(self.stdout))
            .append_pair("stderr", bool_str(self.stderr));
        if let Some(since) = self.since {
            query.append_pair("since", &since.to_string());
        }
        if let Some(until) = self.until {
            query.append_pair("until", &until.to_string());
        }
        query.append_pair("timestamps", bool_str(self.timestamps));
        if let Some(tail) = self.tail {
            query.append_pair("tail", &tail.to_string());
        }
        query.finish()
    }
}

/// Options for `POST /containers/{id}/attach`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachOptions {
    /// Stream output as it is produced.
    pub stream: bool,
    /// Replay previous output first.
    pub logs: bool,
    /// Attach stdin (echoed back on the stdin stream).
    pub stdin: bool,
    /// Attach stdout.
    pub stdout: bool,
    /// Attach stderr.
    pub stderr: bool,
    /// Key sequence for detaching, e.g. `ctrl-p,ctrl-q`.
    pub detach_keys: Option<String>,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            stream: true,
            logs: false,
            stdin: false,
            stdout: true,
            stderr: true,
            detach_keys: None,
        }
    }
}

impl AttachOptions {
    /// Stream stdout and stderr.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream output as it is produced.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Replay previous output before streaming.
    pub fn logs(mut self, logs: bool) -> Self {
        self.logs = logs;
        self
    }

    /// Attach stdin.
    pub fn stdin(mut self, stdin: bool) -> Self {
        self.stdin = stdin;
        self
    }

    /// Include stdout.
    pub fn stdout(mut self, stdout: bool) -> Self {
        self.stdout = stdout;
        self
    }

    /// Include stderr.
    pub fn stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    /// Key sequence for detaching, e.g. `ctrl-p,ctrl-q`.
    pub fn detach_keys(mut self, keys: impl Into<String>) -> Self {
        self.detach_keys = Some(keys.into());
        self
    }

    /// Outputs the demultiplexer should assume for unframed output.
    pub fn requested_outputs(&self) -> RequestedOutputs {
        RequestedOutputs {
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }

    /// Encode as a query string (without the leading `?`).
    pub fn query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("stream", bool_str(self.stream))
            .append_pair("logs", bool_str(self.logs))
            .append_pair("stdin", bool_str(self.stdin))
            .append_pair("stdout", bool_str(self.stdout))
            .append_pair("stderr", bool_str(self.stderr));
        if let Some(keys) = &self.detach_keys {
            query.append_pair("detachKeys", keys);
        }
        query.finish()
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribution() {
        assert_eq!(RequestedOutputs::STDOUT.attribution(), Stream::StdOut);
        assert_eq!(RequestedOutputs::STDERR.attribution(), Stream::StdErr);
        assert_eq!(RequestedOutputs::BOTH.attribution(), Stream::Unknown);
        assert_eq!(RequestedOutputs::default().attribution(), Stream::Unknown);
    }

    #[test]
    fn test_logs_defaults_follow_everything() {
        let options = LogsOptions::default();
        assert!(options.follow);
        assert_eq!(options.requested_outputs(), RequestedOutputs::BOTH);
        assert_eq!(
            options.query(),
            "follow=true&stdout=true&stderr=true&timestamps=false"
        );
    }

    #[test]
    fn test_logs_query_all_fields() {
        let options = LogsOptions::new()
            .follow(false)
            .since(100)
            .until(200)
            .timestamps(true)
            .tail(5);
        assert_eq!(
            options.query(),
            "follow=false&stdout=true&stderr=true&since=100&until=200&timestamps=true&tail=5"
        );
    }

    #[test]
    fn test_logs_validate() {
        assert!(LogsOptions::new().validate().is_ok());

        let none = LogsOptions::new().stdout(false).stderr(false);
        assert!(matches!(
            none.validate(),
            Err(EngineError::InvalidOptions(_))
        ));

        let backwards = LogsOptions::new().since(10).until(5);
        assert!(backwards.validate().is_err());
    }

    #[test]
    fn test_attach_query_encodes_detach_keys() {
        let options = AttachOptions::new().stdin(true).detach_keys("ctrl-p,ctrl-q");
        assert_eq!(
            options.query(),
            "stream=true&logs=false&stdin=true&stdout=true&stderr=true&detachKeys=ctrl-p%2Cctrl-q"
        );
    }

    #[test]
    fn test_attach_outputs() {
        let options = AttachOptions::new().stderr(false);
        assert_eq!(options.requested_outputs(), RequestedOutputs::STDOUT);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: LogsOptions = serde_json::from_str(r#"{"tail": 20}"#).unwrap();
        assert_eq!(options, LogsOptions::new().tail(20));
    }
}

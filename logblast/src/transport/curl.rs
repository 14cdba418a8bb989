//! Delivery through an external command-line HTTP client.
//!
//! The client is launched once per batch as
//! `curl -XPOST <uri> -H 'Content-Type: application/json' --data-binary @-`
//! with the batch written to its stdin. The client's exit status is the
//! outcome. No shell is involved, arguments are passed as-is.

use std::{io::ErrorKind, path::PathBuf, process::Stdio};

use bytes::Bytes;
use http::{HeaderMap, Uri, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, warn};

use super::{Error, Outcome, Transport, code};

/// Configuration for [`Curl`]
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// The client program, resolved through `PATH` when not absolute
    pub program: PathBuf,
    /// Pass `--fail` so HTTP statuses of 400 and above exit non-zero
    pub fail_on_http_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            program: PathBuf::from("curl"),
            fail_on_http_error: false,
        }
    }
}

/// The external client transport.
#[derive(Debug)]
pub struct Curl {
    program: PathBuf,
    arguments: Vec<String>,
}

impl Curl {
    /// Create a new [`Curl`] instance
    ///
    /// # Errors
    ///
    /// Function will error if a header value in `headers` is not visible
    /// ASCII. A `content-type` entry in `headers` is ignored, batches are
    /// always sent as JSON.
    pub fn new(config: &Config, uri: &Uri, headers: &HeaderMap) -> Result<Self, Error> {
        let mut arguments = vec![
            "-XPOST".to_string(),
            uri.to_string(),
            "-H".to_string(),
            "Content-Type: application/json".to_string(),
        ];
        for (name, value) in headers {
            if *name == CONTENT_TYPE {
                continue;
            }
            arguments.push("-H".to_string());
            arguments.push(format!("{name}: {}", value.to_str()?));
        }
        if config.fail_on_http_error {
            arguments.push("--fail".to_string());
        }
        arguments.push("--data-binary".to_string());
        arguments.push("@-".to_string());

        Ok(Self {
            program: config.program.clone(),
            arguments,
        })
    }

    /// The argument vector passed to the client on every send.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}

impl Transport for Curl {
    async fn send(&mut self, body: Bytes) -> Result<Outcome, Error> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.arguments)
            .stdin(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("HTTP client {} not found: {err}", self.program.display());
                return Ok(Outcome::from_code(code::COMMAND_NOT_FOUND));
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                warn!(
                    "HTTP client {} not executable: {err}",
                    self.program.display()
                );
                return Ok(Outcome::from_code(code::NOT_EXECUTABLE));
            }
            Err(err) => return Err(Error::Spawn(err)),
        };

        // The child may exit without draining stdin, its exit status still
        // decides the outcome.
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&body).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    debug!("HTTP client closed stdin early");
                }
                Err(err) => warn!("Failed writing body to HTTP client: {err}"),
            }
            drop(stdin);
        }

        let status = child.wait().await.map_err(Error::Wait)?;
        debug!(%status, "HTTP client exited");
        Ok(Outcome::from(status))
    }
}

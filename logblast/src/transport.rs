//! Delivery of serialized log batches.
//!
//! A transport takes the bytes of one batch, POSTs them to the target and
//! reports an [`Outcome`]. Outcomes are exit-code shaped: zero is success,
//! anything else is a failed send. Two transports exist. [`curl::Curl`] shells
//! out to an external HTTP client, feeding it the body on stdin, and reports
//! the client's exit status. [`native::Native`] speaks HTTP in-process and maps
//! its failures onto the exit codes curl would have produced, see [`code`].
//!
//! Delivery failures are never errors. [`Error`] is reserved for problems
//! that would fail every attempt identically, for example a header that
//! cannot be put on a command line.

use std::{io, process::ExitStatus};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub mod curl;
pub mod native;

/// Exit codes used by the transports. Values follow curl's documented exit
/// codes so both transports report failures the same way.
pub mod code {
    /// Request delivered without client-side error
    pub const SUCCESS: i32 = 0;
    /// Generic failure
    pub const FAILED: i32 = 1;
    /// Failed to connect to host
    pub const COULD_NOT_CONNECT: i32 = 7;
    /// HTTP status 400 or above while failing on HTTP errors
    pub const HTTP_RETURNED_ERROR: i32 = 22;
    /// Operation timed out
    pub const OPERATION_TIMEDOUT: i32 = 28;
    /// Failure receiving network data
    pub const RECV_ERROR: i32 = 56;
    /// Client program found but not executable
    pub const NOT_EXECUTABLE: i32 = 126;
    /// Client program not found
    pub const COMMAND_NOT_FOUND: i32 = 127;
}

#[derive(thiserror::Error, Debug)]
/// Errors produced by a [`Transport`].
pub enum Error {
    /// The client process could not be started for a reason other than a
    /// missing or non-executable program.
    #[error("Unable to spawn HTTP client: {0}")]
    Spawn(io::Error),
    /// The client process could not be waited on.
    #[error("Unable to wait for HTTP client exit: {0}")]
    Wait(io::Error),
    /// A configured header value is not visible ASCII.
    #[error("Header value is not representable as a string: {0}")]
    HeaderValue(#[from] http::header::ToStrError),
    /// Wrapper around [`http::Error`].
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),
}

/// The result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Outcome(i32);

impl Outcome {
    /// The success sentinel
    pub const SUCCESS: Self = Self(code::SUCCESS);

    /// Create an outcome from a raw exit code.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        Self(code)
    }

    /// The raw exit code.
    #[must_use]
    pub fn code(self) -> i32 {
        self.0
    }

    /// Whether the batch was delivered.
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl From<ExitStatus> for Outcome {
    /// A process killed by a signal reports the negated signal number.
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal: Option<i32> = None;

        status.code().or(signal.map(|s| -s)).map_or(Self(-1), Self)
    }
}

/// Deliver one serialized batch.
pub trait Transport {
    /// Send `body` to the target, resolving once delivery has finished one
    /// way or the other.
    ///
    /// # Errors
    ///
    /// Only for conditions that are not a property of this one attempt; a
    /// failed delivery is an unsuccessful [`Outcome`].
    fn send(&mut self, body: Bytes) -> impl Future<Output = Result<Outcome, Error>>;
}

/// Configuration for [`Sender`]
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum Config {
    /// See [`curl::Config`] for details.
    Curl(curl::Config),
    /// See [`native::Config`] for details.
    Native(native::Config),
}

impl Default for Config {
    fn default() -> Self {
        Self::Curl(curl::Config::default())
    }
}

/// Unified transport type for all configured transports
#[derive(Debug)]
pub enum Sender {
    /// See [`curl::Curl`]
    Curl(curl::Curl),
    /// See [`native::Native`]
    Native(native::Native),
}

impl Sender {
    /// Build the transport described by `config`.
    ///
    /// # Errors
    ///
    /// See [`curl::Curl::new`].
    pub fn new(config: &crate::config::Config) -> Result<Self, Error> {
        match &config.transport {
            Config::Curl(curl) => Ok(Self::Curl(curl::Curl::new(
                curl,
                &config.target_uri,
                &config.headers,
            )?)),
            Config::Native(native) => Ok(Self::Native(native::Native::new(
                *native,
                config.target_uri.clone(),
                config.headers.clone(),
            ))),
        }
    }
}

impl Transport for Sender {
    async fn send(&mut self, body: Bytes) -> Result<Outcome, Error> {
        match self {
            Sender::Curl(inner) => inner.send(body).await,
            Sender::Native(inner) => inner.send(body).await,
        }
    }
}

//! In-process HTTP delivery.
//!
//! Performs the same POST the external client would, without a process per
//! batch. Failures are mapped onto curl's exit codes, see
//! [`super::code`], so reports stay comparable between transports.

use std::time::Duration;

use bytes::Bytes;
use http::{
    HeaderMap, Request, Uri,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
};
use http_body_util::{BodyExt, combinators::BoxBody};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Error, Outcome, Transport, code};

/// Configuration for [`Native`]
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Abandon a request after this many seconds. Unset waits indefinitely.
    pub timeout_seconds: Option<u64>,
    /// Count HTTP statuses of 400 and above as failed sends
    pub fail_on_http_error: bool,
}

/// The in-process HTTP transport.
#[derive(Debug)]
pub struct Native {
    client: Client<HttpConnector, BoxBody<Bytes, hyper::Error>>,
    uri: Uri,
    headers: HeaderMap,
    timeout: Option<Duration>,
    fail_on_http_error: bool,
}

impl Native {
    /// Create a new [`Native`] instance
    #[must_use]
    pub fn new(config: Config, uri: Uri, headers: HeaderMap) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(1)
            .retry_canceled_requests(false)
            .build_http();

        Self {
            client,
            uri,
            headers,
            timeout: config.timeout_seconds.map(Duration::from_secs),
            fail_on_http_error: config.fail_on_http_error,
        }
    }

    async fn exchange(&self, request: Request<BoxBody<Bytes, hyper::Error>>) -> Outcome {
        let response = match self.client.request(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!("Failed to send HTTP request to {uri}: {err}", uri = self.uri);
                let code = if err.is_connect() {
                    code::COULD_NOT_CONNECT
                } else {
                    code::FAILED
                };
                return Outcome::from_code(code);
            }
        };

        let status = response.status();
        if let Err(err) = response.into_body().collect().await {
            warn!("Failed reading HTTP response from {uri}: {err}", uri = self.uri);
            return Outcome::from_code(code::RECV_ERROR);
        }
        debug!(status = status.as_u16(), "HTTP response received");

        if self.fail_on_http_error && (status.is_client_error() || status.is_server_error()) {
            Outcome::from_code(code::HTTP_RETURNED_ERROR)
        } else {
            Outcome::SUCCESS
        }
    }
}

impl Transport for Native {
    async fn send(&mut self, body: Bytes) -> Result<Outcome, Error> {
        let body_length = body.len();
        let mut request = Request::builder()
            .method(hyper::Method::POST)
            .uri(&self.uri)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, body_length)
            .body(crate::full(body))?;
        let headers = request.headers_mut();
        for (k, v) in self.headers.iter().filter(|(k, _)| **k != CONTENT_TYPE) {
            headers.append(k, v.clone());
        }

        match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.exchange(request)).await {
                Ok(outcome) => Ok(outcome),
                Err(_elapsed) => {
                    warn!(
                        "HTTP request to {uri} timed out after {secs}s",
                        uri = self.uri,
                        secs = timeout.as_secs()
                    );
                    Ok(Outcome::from_code(code::OPERATION_TIMEDOUT))
                }
            },
            None => Ok(self.exchange(request).await),
        }
    }
}

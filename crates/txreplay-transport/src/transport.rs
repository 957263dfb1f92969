//! The [`Transport`] trait and its default `reqwest`-based HTTP
//! implementation.

use crate::rpc::{JsonRpcRequest, JsonRpcResponse};
use std::sync::Arc;
use std::time::Duration;
use txreplay_core::Error;
use txreplay_retry::RetryAfterHint;

/// Everything the Retry Controller needs to decide whether (and how long)
/// to back off, on top of the taxonomy error itself.
pub struct TransportFailure {
    pub error: Error,
    pub status: Option<u16>,
    pub retry_after: Option<RetryAfterHint>,
}

impl TransportFailure {
    pub fn new(error: Error) -> Self {
        Self {
            error,
            status: None,
            retry_after: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, hint: RetryAfterHint) -> Self {
        self.retry_after = Some(hint);
        self
    }
}

/// One attempt's worth of wire transport: send a request to `url`, get a
/// JSON-RPC envelope or a classified failure back.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportFailure>;
}

/// A function transport -> transport, composed at client construction.
/// Order is deterministic and fixed when the client is built.
pub type Middleware = Arc<dyn Fn(Arc<dyn Transport>) -> Arc<dyn Transport> + Send + Sync>;

/// The default transport: one `reqwest::Client`, a pre-send payload size
/// gate, an optional bearer token, and the attempt-scoped timeout.
///
/// TLS floor is 1.2 (reqwest/rustls default); there is deliberately no
/// insecure-skip-verify knob exposed here.
pub struct HttpTransport {
    client: reqwest::Client,
    auth_token: Option<String>,
    max_request_bytes: usize,
}

pub const DEFAULT_MAX_REQUEST_BYTES: usize = 10 * 1024 * 1024;

impl HttpTransport {
    pub fn new(attempt_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .timeout(attempt_timeout)
            .build()
            .expect("reqwest client configuration is valid");
        Self {
            client,
            auth_token: None,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_max_request_bytes(mut self, bytes: usize) -> Self {
        self.max_request_bytes = bytes;
        self
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportFailure> {
        let body = serde_json::to_vec(request)
            .map_err(|e| TransportFailure::new(Error::marshal_failed(e)))?;
        if body.len() > self.max_request_bytes {
            return Err(TransportFailure::new(Error::request_too_large(
                body.len(),
                self.max_request_bytes,
            )));
        }

        let mut builder = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body);
        if let Some(token) = &self.auth_token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }

        let response = builder.send().await.map_err(|e| {
            let failure = if e.is_timeout() {
                Error::timeout(format!("request to {url} timed out"))
            } else {
                Error::connection_failed(format!("request to {url} failed: {e}"))
            };
            TransportFailure::new(failure)
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(txreplay_retry::parse_retry_after);

        let body_text = response.text().await.map_err(|e| {
            TransportFailure::new(Error::connection_failed(format!(
                "reading response body from {url} failed: {e}"
            )))
        })?;

        if !(200..300).contains(&status) {
            let mut failure =
                TransportFailure::new(txreplay_core::classify_http_status(status, url, &body_text))
                    .with_status(status);
            if let Some(hint) = retry_after {
                failure = failure.with_retry_after(hint);
            }
            return Err(failure);
        }

        serde_json::from_str(&body_text)
            .map_err(|e| TransportFailure::new(Error::unmarshal_failed(e)))
    }
}

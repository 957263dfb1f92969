//! [`TransportClient`]: wires the endpoint pool, retry controller, and a
//! middleware-wrapped [`Transport`] into one per-method call.

use crate::rpc::JsonRpcRequest;
use crate::transport::{Middleware, Transport, TransportFailure};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use txreplay_core::{Error, Network};
use txreplay_metrics::{MetricsSink, Outcome};
use txreplay_pool::Pool;
use txreplay_retry::{Attempt, AttemptFailure, RetryController};

/// Builds a [`TransportClient`] by composing zero or more [`Middleware`]
/// functions around a base [`Transport`], outermost first: the first
/// middleware passed to [`TransportClientBuilder::wrap`] is the outermost
/// wrapper a request passes through.
pub struct TransportClientBuilder {
    transport: Arc<dyn Transport>,
    middleware: Vec<Middleware>,
    metrics: Option<(Network, Arc<MetricsSink>)>,
}

impl TransportClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            middleware: Vec::new(),
            metrics: None,
        }
    }

    pub fn wrap(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Records `remote_node_response_total`/`_duration_seconds` and the
    /// last-success timestamp gauge for every attempt, keyed by the
    /// endpoint actually dispatched to (not the calling method).
    pub fn with_metrics(mut self, network: Network, sink: Arc<MetricsSink>) -> Self {
        self.metrics = Some((network, sink));
        self
    }

    pub fn build(self, pool: Arc<Pool>, retry: RetryController) -> TransportClient {
        let mut transport = self.transport;
        for middleware in self.middleware.into_iter().rev() {
            transport = middleware(transport);
        }
        TransportClient {
            pool,
            retry,
            transport,
            next_id: AtomicU64::new(1),
            metrics: self.metrics,
        }
    }
}

pub struct TransportClient {
    pool: Arc<Pool>,
    retry: RetryController,
    transport: Arc<dyn Transport>,
    next_id: AtomicU64,
    metrics: Option<(Network, Arc<MetricsSink>)>,
}

impl TransportClient {
    /// Runs one JSON-RPC method call through the pool/retry/transport
    /// stack. `cancel` bounds both in-flight attempts and backoff sleeps.
    pub async fn call(&self, cancel: &CancellationToken, method: &str, params: Value) -> Result<Value, Error> {
        self.retry
            .run(cancel, |attempt| {
                let params = params.clone();
                async move {
                    match self.attempt_once(method, params).await {
                        Ok(value) => Attempt::Success(value),
                        Err(failure) => {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(attempt, error = %failure.error, "rpc attempt failed");

                            let mut attempt_failure = AttemptFailure::new(failure.error);
                            if let Some(status) = failure.status {
                                attempt_failure = attempt_failure.with_status(status);
                            }
                            if let Some(hint) = failure.retry_after {
                                attempt_failure = attempt_failure.with_retry_after(hint);
                            }
                            Attempt::Failure(attempt_failure)
                        }
                    }
                }
            })
            .await
    }

    /// Executes exactly one attempt (endpoint selection, send, breaker and
    /// metrics bookkeeping) with no retry loop of its own. For callers that
    /// need a non-default retriability rule instead of the generic retry
    /// controller — e.g. an operation that must never retry once any
    /// response has been read, because the request may already have taken
    /// effect upstream.
    pub async fn attempt_once(&self, method: &str, params: Value) -> Result<Value, TransportFailure> {
        let endpoint = self.pool.select().map_err(TransportFailure::new)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let started = Instant::now();

        match self.transport.send(endpoint.url(), &request).await {
            Ok(response) => {
                self.pool.record_success(&endpoint);
                self.record_attempt(endpoint.url(), Outcome::Success, started.elapsed());

                response.into_result().map_err(TransportFailure::new)
            }
            Err(failure) => {
                if failure.error.is(txreplay_core::RPC_RESPONSE_TOO_LARGE) {
                    self.pool.record_excluded(&endpoint);
                } else {
                    self.pool.record_failure(&endpoint);
                }
                self.record_attempt(endpoint.url(), Outcome::Error, started.elapsed());
                Err(failure)
            }
        }
    }

    fn record_attempt(&self, endpoint_url: &str, outcome: Outcome, elapsed: std::time::Duration) {
        if let Some((network, sink)) = &self.metrics {
            sink.record_attempt(endpoint_url, *network, outcome, elapsed);
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

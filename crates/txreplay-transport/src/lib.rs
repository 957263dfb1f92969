//! HTTP/JSON-RPC transport core for the txreplay RPC access layer.

mod client;
mod rpc;
mod transport;

pub use client::{TransportClient, TransportClientBuilder};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use transport::{HttpTransport, Middleware, Transport, TransportFailure, DEFAULT_MAX_REQUEST_BYTES};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use txreplay_core::Error;
    use txreplay_pool::{CircuitBreakerConfig, Pool};
    use txreplay_retry::{RetryController, RetryPolicy};

    struct ScriptedTransport {
        calls: AtomicUsize,
        fail_first_n: usize,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _url: &str,
            request: &JsonRpcRequest,
        ) -> Result<JsonRpcResponse, TransportFailure> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                return Err(TransportFailure::new(Error::connection_failed("down")));
            }
            Ok(JsonRpcResponse {
                result: Some(json!({ "echo": request.method })),
                error: None,
            })
        }
    }

    fn pool_of(n: usize) -> Arc<Pool> {
        Arc::new(Pool::new(
            (0..n).map(|i| format!("https://rpc{i}.example")),
            CircuitBreakerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let transport = Arc::new(ScriptedTransport {
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
        });
        let client = TransportClientBuilder::new(transport)
            .build(pool_of(1), RetryController::new(RetryPolicy::default()));
        let cancel = CancellationToken::new();
        let result = client.call(&cancel, "getHealth", json!(null)).await.unwrap();
        assert_eq!(result, json!({ "echo": "getHealth" }));
    }

    #[tokio::test]
    async fn retries_through_transport_failures() {
        let transport = Arc::new(ScriptedTransport {
            calls: AtomicUsize::new(0),
            fail_first_n: 2,
        });
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1))
            .max_attempts(5)
            .build();
        let client = TransportClientBuilder::new(transport)
            .build(pool_of(1), RetryController::new(policy));
        let cancel = CancellationToken::new();
        let result = client.call(&cancel, "getHealth", json!(null)).await.unwrap();
        assert_eq!(result, json!({ "echo": "getHealth" }));
    }

    #[tokio::test]
    async fn middleware_chain_runs_outermost_first() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        struct TraceTransport {
            label: &'static str,
            inner: Arc<dyn Transport>,
            order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        }

        #[async_trait]
        impl Transport for TraceTransport {
            async fn send(
                &self,
                url: &str,
                request: &JsonRpcRequest,
            ) -> Result<JsonRpcResponse, TransportFailure> {
                self.order.lock().unwrap().push(self.label);
                self.inner.send(url, request).await
            }
        }

        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport {
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
        });

        let order_a = Arc::clone(&order);
        let order_b = Arc::clone(&order);
        let client = TransportClientBuilder::new(transport)
            .wrap(Arc::new(move |inner| {
                Arc::new(TraceTransport {
                    label: "outer",
                    inner,
                    order: Arc::clone(&order_a),
                })
            }))
            .wrap(Arc::new(move |inner| {
                Arc::new(TraceTransport {
                    label: "inner",
                    inner,
                    order: Arc::clone(&order_b),
                })
            }))
            .build(pool_of(1), RetryController::new(RetryPolicy::default()));

        let cancel = CancellationToken::new();
        client.call(&cancel, "getHealth", json!(null)).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["outer", "inner"]);
    }

    /// Pool of [A, B]; A returns 429 with `Retry-After: 1` twice then
    /// succeeds; retry policy max-attempts=3. Expect exactly 3 attempts,
    /// all on A (pool selection is priority order, not round-robin, and
    /// A's breaker never opens), with the server-hinted delay observed
    /// between attempts.
    #[tokio::test(start_paused = true)]
    async fn pool_failover_scenario_s1() {
        struct RateLimitedThenOk {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Transport for RateLimitedThenOk {
            async fn send(
                &self,
                url: &str,
                _request: &JsonRpcRequest,
            ) -> Result<JsonRpcResponse, TransportFailure> {
                assert_eq!(url, "https://rpc0.example", "B must never be called");
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    return Err(TransportFailure::new(Error::rate_limit_exceeded("slow down"))
                        .with_status(429)
                        .with_retry_after(txreplay_retry::RetryAfterHint(Duration::from_secs(1))));
                }
                Ok(JsonRpcResponse {
                    result: Some(json!({ "ok": true })),
                    error: None,
                })
            }
        }

        let transport = Arc::new(RateLimitedThenOk {
            calls: AtomicUsize::new(0),
        });
        let pool = Arc::new(Pool::new(
            vec!["https://rpc0.example".to_string(), "https://rpc1.example".to_string()],
            CircuitBreakerConfig::default(),
        ));
        let policy = RetryPolicy::builder().max_attempts(3).build();
        let client = TransportClientBuilder::new(transport.clone()).build(pool, RetryController::new(policy));

        let cancel = CancellationToken::new();
        let started = tokio::time::Instant::now();
        let result = client.call(&cancel, "getHealth", json!(null)).await.unwrap();
        assert_eq!(result, json!({ "ok": true }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}

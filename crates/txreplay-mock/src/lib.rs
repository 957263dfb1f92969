//! [`MockTransport`]: an in-memory [`Transport`] double that maps a
//! JSON-RPC method name to a scripted response queue (status, body,
//! optional `Retry-After` hint) and counts invocations per method.
//!
//! Routes can be added, replaced, or removed after construction, so a
//! test can script a failure sequence, hand the transport to a
//! [`TransportClient`](txreplay_transport::TransportClient), run the
//! call, then assert on both the returned value and how many times each
//! method was actually invoked.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use txreplay_core::Error;
use txreplay_retry::RetryAfterHint;
use txreplay_transport::{JsonRpcRequest, JsonRpcResponse, Transport, TransportFailure};

/// One scripted outcome for a single invocation of a method.
pub enum Scripted {
    /// A successful JSON-RPC `result` payload.
    Ok(serde_json::Value),
    /// A failure as the transport layer would classify it: a coded
    /// error, an optional HTTP-equivalent status, and an optional
    /// `Retry-After` hint.
    Err {
        error: Error,
        status: Option<u16>,
        retry_after: Option<RetryAfterHint>,
    },
}

// `Error` carries a non-`Clone` boxed cause, so this reconstructs from the
// stable code and message rather than deriving `Clone` on the enum.
impl Clone for Scripted {
    fn clone(&self) -> Self {
        match self {
            Scripted::Ok(value) => Scripted::Ok(value.clone()),
            Scripted::Err { error, status, retry_after } => Scripted::Err {
                error: Error::from_code(error.code(), error.message()),
                status: *status,
                retry_after: retry_after.clone(),
            },
        }
    }
}

impl Scripted {
    pub fn ok(value: serde_json::Value) -> Self {
        Scripted::Ok(value)
    }

    pub fn err(error: Error) -> Self {
        Scripted::Err {
            error,
            status: None,
            retry_after: None,
        }
    }

    pub fn err_with_status(error: Error, status: u16) -> Self {
        Scripted::Err {
            error,
            status: Some(status),
            retry_after: None,
        }
    }

    pub fn err_with_retry_after(error: Error, status: u16, retry_after: Duration) -> Self {
        Scripted::Err {
            error,
            status: Some(status),
            retry_after: Some(RetryAfterHint(retry_after)),
        }
    }
}

type RouteFn = Arc<dyn Fn(&JsonRpcRequest) -> Scripted + Send + Sync>;

enum RouteKind {
    /// Consumed front-to-back; the last entry repeats once the queue is
    /// drained, so a route can script "fail twice, then succeed forever".
    Scripted(VecDeque<Scripted>),
    /// Computes the outcome from the request's params, for tests that need
    /// a response shaped by what was actually sent (e.g. echoing back only
    /// the keys a batched request asked for).
    Dynamic(RouteFn),
}

struct Route {
    kind: RouteKind,
    calls: u64,
    delay: Option<Duration>,
}

/// A [`Transport`] that never touches the network. Every call into
/// [`Transport::send`] looks up the request's method, pops (or repeats)
/// the next scripted outcome, and bumps that method's invocation count.
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<String, Route>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts `method` to return `outcomes` in order; the last one
    /// repeats for any call beyond the queue's length. Replaces any
    /// existing route for `method`.
    pub fn route(&self, method: impl Into<String>, outcomes: impl IntoIterator<Item = Scripted>) -> &Self {
        let route = Route {
            kind: RouteKind::Scripted(outcomes.into_iter().collect()),
            calls: 0,
            delay: None,
        };
        self.routes.lock().insert(method.into(), route);
        self
    }

    /// Adds a fixed delay before every future invocation of `method`
    /// responds, to exercise concurrency timing (e.g. batched calls
    /// dispatched in parallel finishing sooner than serially). Must be
    /// called after the route is added.
    pub fn with_delay(&self, method: &str, delay: Duration) -> &Self {
        if let Some(route) = self.routes.lock().get_mut(method) {
            route.delay = Some(delay);
        }
        self
    }

    /// Convenience for a route that always returns the same outcome.
    pub fn always(&self, method: impl Into<String>, outcome: Scripted) -> &Self {
        self.route(method, [outcome])
    }

    /// Scripts `method`'s outcome as a function of the request actually
    /// sent, e.g. to echo back only the keys a batched call asked for.
    pub fn route_fn(
        &self,
        method: impl Into<String>,
        f: impl Fn(&JsonRpcRequest) -> Scripted + Send + Sync + 'static,
    ) -> &Self {
        let route = Route {
            kind: RouteKind::Dynamic(Arc::new(f)),
            calls: 0,
            delay: None,
        };
        self.routes.lock().insert(method.into(), route);
        self
    }

    /// Removes a previously added route. Calls to `method` after this
    /// fall through to `unrouted_error` on [`MockTransport::send`].
    pub fn remove_route(&self, method: &str) {
        self.routes.lock().remove(method);
    }

    /// How many times `method` has been invoked, regardless of whether a
    /// route exists for it.
    pub fn call_count(&self, method: &str) -> u64 {
        self.routes.lock().get(method).map(|r| r.calls).unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, _url: &str, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportFailure> {
        let (outcome, delay) = {
            let mut routes = self.routes.lock();
            let Some(route) = routes.get_mut(&request.method) else {
                return Err(TransportFailure::new(Error::connection_failed(format!(
                    "mock transport has no route for method {}",
                    request.method
                ))));
            };
            route.calls += 1;
            let outcome = match &mut route.kind {
                RouteKind::Dynamic(f) => f(request),
                RouteKind::Scripted(queue) => {
                    if queue.len() > 1 {
                        queue.pop_front().expect("checked non-empty above")
                    } else {
                        queue
                            .front()
                            .cloned()
                            .expect("route must be scripted with at least one outcome")
                    }
                }
            };
            (outcome, route.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            Scripted::Ok(value) => Ok(JsonRpcResponse {
                result: Some(value),
                error: None,
            }),
            Scripted::Err {
                error,
                status,
                retry_after,
            } => {
                let mut failure = TransportFailure::new(error);
                if let Some(status) = status {
                    failure = failure.with_status(status);
                }
                if let Some(hint) = retry_after {
                    failure = failure.with_retry_after(hint);
                }
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn routes_an_ok_response_and_counts_calls() {
        let mock = MockTransport::new();
        mock.always("getHealth", Scripted::ok(json!({ "status": "healthy" })));

        let request = JsonRpcRequest::new(1, "getHealth", serde_json::Value::Null);
        let response = mock.send("unused", &request).await.unwrap();
        assert_eq!(response.result.unwrap()["status"], "healthy");
        assert_eq!(mock.call_count("getHealth"), 1);
    }

    #[tokio::test]
    async fn unrouted_method_fails() {
        let mock = MockTransport::new();
        let request = JsonRpcRequest::new(1, "getHealth", serde_json::Value::Null);
        assert!(mock.send("unused", &request).await.is_err());
    }

    #[tokio::test]
    async fn a_queue_is_consumed_then_the_last_entry_repeats() {
        let mock = MockTransport::new();
        mock.route(
            "getTransaction",
            [
                Scripted::err(Error::connection_failed("down")),
                Scripted::ok(json!({ "status": "ok" })),
            ],
        );

        let request = JsonRpcRequest::new(1, "getTransaction", serde_json::Value::Null);
        assert!(mock.send("unused", &request).await.is_err());
        assert!(mock.send("unused", &request).await.is_ok());
        assert!(mock.send("unused", &request).await.is_ok());
        assert_eq!(mock.call_count("getTransaction"), 3);
    }

    #[tokio::test]
    async fn removing_a_route_makes_it_unrouted_again() {
        let mock = MockTransport::new();
        mock.always("getHealth", Scripted::ok(json!({})));
        mock.remove_route("getHealth");

        let request = JsonRpcRequest::new(1, "getHealth", serde_json::Value::Null);
        assert!(mock.send("unused", &request).await.is_err());
    }
}

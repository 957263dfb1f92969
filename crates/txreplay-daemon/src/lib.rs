//! The daemon façade: `POST /rpc`, `GET /metrics`, `GET /health` over the
//! request orchestrator. Requests are handled on independent tokio
//! tasks; there is no session state at this layer.

mod dispatch;
mod wire;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use txreplay_metrics::MetricsSink;
use txreplay_rpc::Orchestrator;
use wire::{DaemonRequest, DaemonResponse};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: Arc<MetricsSink>,
    pub request_timeout: Duration,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn rpc_handler(State(state): State<AppState>, Json(request): Json<DaemonRequest>) -> impl IntoResponse {
    let id = request.id.clone();
    let outcome = dispatch::dispatch(&state.orchestrator, &request, state.request_timeout).await;
    match outcome {
        Ok(value) => Json(DaemonResponse::ok(id, value)),
        Err(error) => {
            tracing::debug!(method = %request.method, code = error.code(), "rpc dispatch failed");
            Json(DaemonResponse::err(id, &error))
        }
    }
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.render())
}

/// Daemon-process liveness: always fast, never calls upstream. The
/// Orchestrator's own `Health` operation (upstream liveness) is reached
/// through `POST /rpc` with method `health` instead.
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use txreplay_cache::Cache;
    use txreplay_core::Network;
    use txreplay_mock::{MockTransport, Scripted};
    use txreplay_pool::{CircuitBreakerConfig, Pool};
    use txreplay_retry::{RetryController, RetryPolicy};
    use txreplay_rpc::OrchestratorConfig;
    use txreplay_transport::{TransportClientBuilder};

    fn state_with(mock: MockTransport) -> AppState {
        let metrics = Arc::new(MetricsSink::install_for_test());
        let pool = Arc::new(Pool::new(["https://rpc0.example".to_string()], CircuitBreakerConfig::default()));
        let client = TransportClientBuilder::new(Arc::new(mock))
            .with_metrics(Network::Test, Arc::clone(&metrics))
            .build(pool, RetryController::new(RetryPolicy::default()));
        let orchestrator = Orchestrator::new(Network::Test, client, Some(Arc::new(Cache::open_in_memory().unwrap())), OrchestratorConfig::default());
        AppState {
            orchestrator: Arc::new(orchestrator),
            metrics,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn health_endpoint_is_always_ok() {
        let mock = MockTransport::new();
        let response = app(state_with(mock))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rpc_endpoint_dispatches_a_supported_method() {
        let mock = MockTransport::new();
        mock.always("getHealth", Scripted::ok(json!({ "status": "healthy" })));
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "health", "params": {} });
        let response = app(state_with(mock))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rpc")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// One successful and one failed call through `/rpc` are reflected in
    /// the `/metrics` scrape as separate counter series.
    #[tokio::test]
    async fn metrics_scrape_reflects_a_success_and_a_failure() {
        const KEY1: &str = "a2V5MQ=="; // b"key1"
        const KEY2: &str = "a2V5Mg=="; // b"key2"

        let mock = MockTransport::new();
        mock.route(
            "getLedgerEntries",
            [
                Scripted::ok(json!({ "entries": [ { "key": KEY1, "xdr": "AAAA" } ] })),
                Scripted::err(txreplay_core::Error::connection_failed("down")),
            ],
        );
        let state = state_with(mock);

        let call = |keys: &str| {
            json!({ "jsonrpc": "2.0", "id": 1, "method": "fetchLedgerEntries", "params": { "keys": [keys] } })
        };

        let ok_response = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rpc")
                    .header("content-type", "application/json")
                    .body(Body::from(call(KEY1).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ok_response.status(), StatusCode::OK);

        let err_response = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rpc")
                    .header("content-type", "application/json")
                    .body(Body::from(call(KEY2).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(err_response.status(), StatusCode::OK);

        let scrape = app(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(scrape.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();

        assert!(body.contains("remote_node_response_total"));
        assert!(body.contains("endpoint=\"https://rpc0.example\""));
        assert!(body.contains("status=\"success\""));
        assert!(body.contains("status=\"error\""));
    }

    #[tokio::test]
    async fn rpc_endpoint_rejects_an_unsupported_method() {
        let mock = MockTransport::new();
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "notAMethod", "params": {} });
        let response = app(state_with(mock))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rpc")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

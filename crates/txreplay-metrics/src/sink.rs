//! [`MetricsSink`]: records per-(endpoint, network) counters, a duration
//! histogram, and the last-success timestamp gauge that backs staleness
//! alerts.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use txreplay_core::Network;

static TEST_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Histogram buckets for `remote_node_response_duration_seconds`.
pub const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Whether an attempt succeeded or failed, for the `status` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

/// Process-wide metrics recorder plus a Prometheus text exporter for the
/// `/metrics` scrape endpoint.
///
/// This wraps the `metrics` facade crate (`counter!`, `gauge!`,
/// `histogram!`); recording is unconditional since metrics are this
/// crate's only job.
pub struct MetricsSink {
    handle: PrometheusHandle,
}

impl MetricsSink {
    /// Installs the global Prometheus recorder. Calling this more than
    /// once per process will panic in the underlying exporter; build
    /// exactly one `MetricsSink` per daemon process.
    pub fn install() -> Self {
        let builder = PrometheusBuilder::new().set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "remote_node_response_duration_seconds".to_string(),
            ),
            &DURATION_BUCKETS,
        );
        let builder = match builder {
            Ok(b) => b,
            Err(_) => PrometheusBuilder::new(),
        };
        let handle = builder
            .install_recorder()
            .expect("failed to install the Prometheus metrics recorder");
        Self { handle }
    }

    /// Installs (at most once per process) a recorder shared by every
    /// test that needs a [`MetricsSink`], since the underlying exporter
    /// panics if a second global recorder is installed.
    pub fn install_for_test() -> Self {
        let handle = TEST_HANDLE
            .get_or_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .expect("failed to install the test Prometheus metrics recorder")
            })
            .clone();
        Self { handle }
    }

    /// Records one completed attempt: the total counter, the duration
    /// histogram, and — only on success — the last-success timestamp
    /// gauge. This ordering is the contract that makes
    /// `now - gauge > threshold` a valid staleness alert: the gauge is
    /// untouched on error.
    pub fn record_attempt(
        &self,
        endpoint: &str,
        network: Network,
        outcome: Outcome,
        duration: Duration,
    ) {
        let endpoint = endpoint.to_string();
        let network_label = network.as_str();

        metrics::counter!(
            "remote_node_response_total",
            "endpoint" => endpoint.clone(),
            "network" => network_label,
            "status" => outcome.as_str(),
        )
        .increment(1);

        metrics::histogram!(
            "remote_node_response_duration_seconds",
            "endpoint" => endpoint.clone(),
            "network" => network_label,
        )
        .record(duration.as_secs_f64());

        if outcome == Outcome::Success {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64();
            metrics::gauge!(
                "remote_node_last_response_timestamp_seconds",
                "endpoint" => endpoint,
                "network" => network_label,
            )
            .set(now);
        }
    }

    /// Increments the process-wide simulation counter.
    pub fn record_simulation(&self, outcome: Outcome) {
        metrics::counter!("simulation_execution_total", "status" => outcome.as_str()).increment(1);
    }

    /// Renders the current metrics in Prometheus text exposition format,
    /// for the `/metrics` scrape endpoint.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

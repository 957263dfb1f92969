//! `txreplayd`: the daemon binary. Loads configuration, wires
//! pool/retry/transport/cache into an Orchestrator, installs the metrics
//! recorder, and serves `/rpc`, `/metrics`, `/health`.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use txreplay_cache::Cache;
use txreplay_config::Config;
use txreplay_daemon::{app, AppState};
use txreplay_metrics::MetricsSink;
use txreplay_pool::{CircuitBreakerConfig, Pool};
use txreplay_retry::{RetryController, RetryPolicy};
use txreplay_rpc::{Orchestrator, OrchestratorConfig};
use txreplay_transport::{HttpTransport, TransportClientBuilder};

#[derive(Parser, Debug)]
#[command(name = "txreplayd", about = "RPC access layer daemon for replaying ledger transactions")]
struct Cli {
    /// Path to a `key = value` config file; environment variables still
    /// take precedence over its contents.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Address to bind the HTTP listener on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).unwrap_or_else(|e| {
        eprintln!("configuration error: {e}");
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.as_str()))
        .init();

    let metrics = Arc::new(MetricsSink::install());

    let pool = Arc::new(Pool::new(config.rpc_urls.clone(), CircuitBreakerConfig::default()));
    let retry = RetryController::new(RetryPolicy::default());
    let mut transport = HttpTransport::new(config.request_timeout);
    if let Some(token) = &config.rpc_token {
        transport = transport.with_auth_token(token.clone());
    }
    let client = TransportClientBuilder::new(Arc::new(transport))
        .with_metrics(config.network, Arc::clone(&metrics))
        .build(pool, retry);

    let cache = Cache::open(&config.cache_path).unwrap_or_else(|e| {
        eprintln!("cache error: {e}");
        std::process::exit(1);
    });

    let orchestrator = Arc::new(
        Orchestrator::new(config.network, client, Some(Arc::new(cache)), OrchestratorConfig::default())
            .with_metrics(Arc::clone(&metrics)),
    );

    let state = AppState {
        orchestrator,
        metrics,
        request_timeout: config.request_timeout,
    };

    tracing::info!(bind = %cli.bind, network = %config.network, "starting txreplayd");

    let listener = TcpListener::bind(cli.bind).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {}: {e}", cli.bind);
        std::process::exit(1);
    });

    if let Err(e) = axum::serve(listener, app(state).into_make_service()).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

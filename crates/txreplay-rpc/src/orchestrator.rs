//! [`Orchestrator`]: the five public operations —
//! `FetchTransaction`, `FetchLedgerEntries`, `Simulate`, `SendTransaction`,
//! `Health` — on top of the transport/pool/retry/cache/verify stack.

use crate::cache_key;
use crate::single_flight::SingleFlight;
use crate::types::{Liveness, SimulateOptions, TransactionResult};
use crate::wire;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use txreplay_cache::Cache;
use txreplay_core::{Error, Network};
use txreplay_metrics::{MetricsSink, Outcome};
use txreplay_retry::{apply_hint, next_delay, RetryPolicy};
use txreplay_transport::TransportClient;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_WORKERS: usize = 5;
pub const DEFAULT_TRANSACTION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Caller-tunable knobs for the orchestrator beyond what the pool/retry
/// controller/transport already own.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub batch_size: usize,
    pub max_workers: usize,
    pub transaction_ttl: Duration,
    /// Retry policy for `SendTransaction`'s pre-response-only retry rule;
    /// only its delay shape is used, not its status-retriable set.
    pub send_retry_policy: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            transaction_ttl: DEFAULT_TRANSACTION_TTL,
            send_retry_policy: RetryPolicy::default(),
        }
    }
}

pub struct Orchestrator {
    network: Network,
    transport: TransportClient,
    cache: Option<Arc<Cache>>,
    config: OrchestratorConfig,
    metrics: Option<Arc<MetricsSink>>,
    tx_single_flight: SingleFlight<String, TransactionResult>,
    entries_single_flight: SingleFlight<String, HashMap<String, String>>,
}

impl Orchestrator {
    pub fn new(
        network: Network,
        transport: TransportClient,
        cache: Option<Arc<Cache>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            network,
            transport,
            cache,
            config,
            metrics: None,
            tx_single_flight: SingleFlight::new(),
            entries_single_flight: SingleFlight::new(),
        }
    }

    /// Records `simulation_execution_total` through the shared sink
    /// instead of the process-wide `metrics` facade directly.
    pub fn with_metrics(mut self, sink: Arc<MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    /// Cache-first. On miss, one upstream request; cached on success with
    /// the configured TTL. `tx-not-found` is the coded sentinel and is
    /// never cached.
    pub async fn fetch_transaction(
        &self,
        cancel: &CancellationToken,
        hash: &str,
    ) -> Result<TransactionResult, Error> {
        let cache_key = cache_key::transaction_key(self.network, hash);

        if let Some(cached) = self.read_cache::<TransactionResult>(&cache_key)? {
            return Ok(cached);
        }

        let hash_owned = hash.to_string();
        let result = self
            .tx_single_flight
            .run(cache_key.clone(), || async move {
                let value = self
                    .transport
                    .call(cancel, "getTransaction", json!({ "hash": hash_owned }))
                    .await?;
                let raw = wire::parse_transaction(value, &hash_owned)?;
                Ok(TransactionResult {
                    envelope: raw
                        .envelope_xdr
                        .ok_or_else(|| Error::validation_failed("getTransaction response missing envelopeXdr"))?,
                    result: raw
                        .result_xdr
                        .ok_or_else(|| Error::validation_failed("getTransaction response missing resultXdr"))?,
                    result_meta: raw
                        .result_meta_xdr
                        .ok_or_else(|| Error::validation_failed("getTransaction response missing resultMetaXdr"))?,
                })
            })
            .await?;

        self.write_cache(&cache_key, &result, self.config.transaction_ttl);
        Ok(result)
    }

    /// Empty `keys` yields an empty map. Otherwise: dedupe, partition into
    /// batches of at most `batch_size`, dispatch up to `max_workers`
    /// batches concurrently, verify each batch against its requested keys,
    /// and union the results. On the first batch error, remaining batches
    /// are cancelled and that error is returned.
    pub async fn fetch_ledger_entries(
        &self,
        cancel: &CancellationToken,
        keys: &[String],
    ) -> Result<HashMap<String, String>, Error> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut unique: Vec<String> = Vec::with_capacity(keys.len());
        for k in keys {
            if !unique.contains(k) {
                unique.push(k.clone());
            }
        }

        let batch_cancel = cancel.child_token();
        let batches: Vec<Vec<String>> = unique
            .chunks(self.config.batch_size.max(1))
            .map(|c| c.to_vec())
            .collect();

        let mut stream = stream::iter(batches.into_iter().map(|batch| {
            let batch_cancel = batch_cancel.clone();
            async move { self.fetch_batch(&batch_cancel, batch).await }
        }))
        .buffer_unordered(self.config.max_workers.max(1));

        let mut combined = HashMap::with_capacity(unique.len());
        let mut first_error = None;
        while let Some(outcome) = stream.next().await {
            match outcome {
                Ok(map) => combined.extend(map),
                Err(err) => {
                    batch_cancel.cancel();
                    first_error = Some(err);
                    break;
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(combined),
        }
    }

    async fn fetch_batch(
        &self,
        cancel: &CancellationToken,
        batch: Vec<String>,
    ) -> Result<HashMap<String, String>, Error> {
        let mut sorted = batch;
        sorted.sort_unstable();
        let cache_key = cache_key::ledger_entries_key(self.network, &sorted);

        if let Some(cached) = self.read_cache::<HashMap<String, String>>(&cache_key)? {
            return Ok(cached);
        }

        let sorted_for_request = sorted.clone();
        let verified = self
            .entries_single_flight
            .run(cache_key.clone(), || async move {
                let value = self
                    .transport
                    .call(cancel, "getLedgerEntries", json!({ "keys": sorted_for_request }))
                    .await?;
                let entries = wire::parse_ledger_entries(value)?;
                txreplay_verify::verify_entries(&sorted, &entries)
            })
            .await?;

        self.write_cache(&cache_key, &verified, self.config.transaction_ttl);
        Ok(verified)
    }

    /// Not cached. Retries only on retriable transport failures; the
    /// engine's own error responses (inside a successful envelope) are
    /// surfaced verbatim.
    pub async fn simulate(
        &self,
        cancel: &CancellationToken,
        envelope_xdr: &str,
        opts: SimulateOptions,
    ) -> Result<Value, Error> {
        let params = json!({
            "transaction": envelope_xdr,
            "resourceConfig": opts.mock_base_fee.map(|fee| json!({ "baseFee": fee })),
            "protocolVersion": opts.min_protocol_version,
        });
        let result = self.transport.call(cancel, "simulateTransaction", params).await;

        if let Some(sink) = &self.metrics {
            sink.record_simulation(if result.is_ok() { Outcome::Success } else { Outcome::Error });
        }

        result
    }

    /// Never retried on any response the server has read and answered
    /// (including a 4xx): once a status comes back, the request may
    /// already have taken effect upstream. Retried only on transport
    /// failures observed before any response was read.
    pub async fn send_transaction(&self, envelope_xdr: &str) -> Result<Value, Error> {
        let policy = &self.config.send_retry_policy;
        let mut rng = rand::thread_rng();
        let mut prior_delay = Duration::ZERO;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            let params = json!({ "transaction": envelope_xdr });
            match self.transport.attempt_once("sendTransaction", params).await {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    let pre_response = failure.status.is_none()
                        && (failure.error.is(txreplay_core::RPC_CONNECTION_FAILED)
                            || failure.error.is(txreplay_core::RPC_TIMEOUT));
                    if !pre_response || attempts >= policy.max_attempts() {
                        return Err(failure.error);
                    }
                    let computed = next_delay(policy, prior_delay, &mut rng);
                    let delay = apply_hint(policy, computed, failure.retry_after);
                    prior_delay = delay;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Single-shot, no retry, short timeout (owned by the transport's
    /// configured attempt timeout). Bypasses the retry controller entirely.
    pub async fn health(&self) -> Result<Liveness, Error> {
        let value = self
            .transport
            .attempt_once("getHealth", Value::Null)
            .await
            .map_err(|failure| failure.error)?;
        serde_json::from_value(value).map_err(Error::unmarshal_failed)
    }

    fn read_cache<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        match cache.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(Error::unmarshal_failed),
            None => Ok(None),
        }
    }

    fn write_cache<T: serde::Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(cache) = &self.cache else { return };
        if let Ok(bytes) = serde_json::to_vec(value) {
            let _ = cache.put(key, &bytes, self.network, ttl);
        }
    }
}

//! The ordered [`Pool`] of interchangeable [`Endpoint`]s.

use crate::circuit::{Circuit, CircuitBreakerConfig, CircuitState};
use std::sync::Arc;
use txreplay_core::Error;

/// One RPC endpoint plus its health state. Created when the pool is
/// constructed; mutated only through [`Pool`]'s record methods; dropped
/// with the pool.
pub struct Endpoint {
    url: String,
    circuit: Circuit,
}

impl Endpoint {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> CircuitState {
        self.circuit.state()
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.circuit.consecutive_failures()
    }
}

/// An ordered, fixed-size set of equivalent endpoints. Iteration order is
/// the caller-supplied priority order; at least one endpoint always
/// exists.
pub struct Pool {
    endpoints: Vec<Arc<Endpoint>>,
}

impl Pool {
    /// Builds a pool from `urls` in priority order. Panics if `urls` is
    /// empty: at least one endpoint must exist, so an empty pool is a
    /// construction-time programmer error, not a runtime condition
    /// callers recover from.
    pub fn new(urls: impl IntoIterator<Item = String>, config: CircuitBreakerConfig) -> Self {
        let endpoints: Vec<Arc<Endpoint>> = urls
            .into_iter()
            .map(|url| {
                Arc::new(Endpoint {
                    url,
                    circuit: Circuit::new(config),
                })
            })
            .collect();
        assert!(!endpoints.is_empty(), "endpoint pool must not be empty");
        Self { endpoints }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Selects the next eligible endpoint in priority order, skipping
    /// breakers that are open and not yet eligible to probe. Claims the
    /// single half-open probe slot atomically when it lands on one.
    /// Returns `ALL_ENDPOINTS_FAILED` if none admit.
    pub fn select(&self) -> Result<Arc<Endpoint>, Error> {
        for endpoint in &self.endpoints {
            if endpoint.circuit.try_admit() {
                return Ok(Arc::clone(endpoint));
            }
        }
        Err(Error::all_endpoints_failed(format!(
            "all {} endpoints have open circuit breakers",
            self.endpoints.len()
        )))
    }

    pub fn record_success(&self, endpoint: &Endpoint) {
        endpoint.circuit.record_success();
        #[cfg(feature = "metrics")]
        metrics::gauge!("endpoint_circuit_state", "endpoint" => endpoint.url.clone())
            .set(endpoint.state() as u8 as f64);
    }

    /// Records a failure that should count against the breaker. Callers
    /// must NOT call this for a 413 (response-too-large) outcome; use
    /// [`Pool::record_excluded`] instead.
    pub fn record_failure(&self, endpoint: &Endpoint) {
        endpoint.circuit.record_failure();
        #[cfg(feature = "metrics")]
        metrics::gauge!("endpoint_circuit_state", "endpoint" => endpoint.url.clone())
            .set(endpoint.state() as u8 as f64);
    }

    /// Records an outcome that must never affect breaker health: 413
    /// responses (a client-request issue) are the documented case.
    pub fn record_excluded(&self, _endpoint: &Endpoint) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(n: usize) -> Pool {
        Pool::new(
            (0..n).map(|i| format!("https://rpc{i}.example")),
            CircuitBreakerConfig {
                failure_threshold: 5,
                open_timeout: std::time::Duration::from_secs(30),
            },
        )
    }

    #[test]
    #[should_panic(expected = "endpoint pool must not be empty")]
    fn rejects_empty_pool() {
        Pool::new(Vec::<String>::new(), CircuitBreakerConfig::default());
    }

    #[test]
    fn selects_in_priority_order_when_all_closed() {
        let pool = pool_of(3);
        let selected = pool.select().unwrap();
        assert_eq!(selected.url(), "https://rpc0.example");
    }

    #[test]
    fn all_open_with_no_timeout_elapsed_yields_all_endpoints_failed() {
        let pool = pool_of(2);
        for endpoint in pool.endpoints() {
            for _ in 0..5 {
                pool.record_failure(endpoint);
            }
        }
        let err = pool.select().unwrap_err();
        assert!(err.is(txreplay_core::RPC_ALL_ENDPOINTS_FAILED));
    }

    #[test]
    fn failover_skips_open_breaker() {
        let pool = pool_of(2);
        let first = Arc::clone(&pool.endpoints()[0]);
        for _ in 0..5 {
            pool.record_failure(&first);
        }
        let selected = pool.select().unwrap();
        assert_eq!(selected.url(), "https://rpc1.example");
    }

    #[test]
    fn excluded_outcome_never_opens_breaker() {
        let pool = pool_of(1);
        let endpoint = Arc::clone(&pool.endpoints()[0]);
        for _ in 0..100 {
            pool.record_excluded(&endpoint);
        }
        assert_eq!(endpoint.state(), CircuitState::Closed);
        assert!(pool.select().is_ok());
    }
}

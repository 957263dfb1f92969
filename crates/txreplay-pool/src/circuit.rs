//! The per-endpoint three-state circuit breaker: an atomic `u8` state
//! plus a consecutive-failure counter, rather than a sliding-window
//! failure rate.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Configuration shared by every breaker in a pool.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: usize,
    /// How long the breaker stays open before allowing one half-open probe.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-endpoint circuit breaker state, mutated under atomics so the pool
/// can select an endpoint without holding a lock across an await point.
pub(crate) struct Circuit {
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    /// Millis since an arbitrary epoch (process start) at which the
    /// breaker opened; used to compute elapsed time without a mutex.
    opened_at_millis: AtomicU64,
    epoch: Instant,
    half_open_claimed: AtomicBool,
    config: CircuitBreakerConfig,
}

impl Circuit {
    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            consecutive_failures: AtomicU64::new(0),
            opened_at_millis: AtomicU64::new(0),
            epoch: Instant::now(),
            half_open_claimed: AtomicBool::new(false),
            config,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn open_elapsed(&self) -> Duration {
        let opened = self.opened_at_millis.load(Ordering::Acquire);
        let now = self.now_millis();
        Duration::from_millis(now.saturating_sub(opened))
    }

    /// Returns `true` if this breaker currently admits a call: either
    /// closed, or open-but-eligible-to-probe (in which case the probe
    /// slot is atomically claimed as a side effect), or half-open with
    /// the single probe slot still free (also claimed as a side effect).
    pub(crate) fn try_admit(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.open_elapsed() >= self.config.open_timeout {
                    // Transition to half-open and claim the probe atomically
                    // by only succeeding for the caller that wins the CAS.
                    if self
                        .state
                        .compare_exchange(
                            CircuitState::Open as u8,
                            CircuitState::HalfOpen as u8,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        self.half_open_claimed.store(true, Ordering::Release);
                        true
                    } else {
                        // Another thread already moved it to half-open;
                        // defer to the half-open claim path below.
                        self.try_claim_half_open_probe()
                    }
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => self.try_claim_half_open_probe(),
        }
    }

    fn try_claim_half_open_probe(&self) -> bool {
        self.half_open_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// A successful call. Closes the breaker if it was half-open;
    /// resets the consecutive-failure counter.
    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        if self.state() == CircuitState::HalfOpen {
            self.state
                .store(CircuitState::Closed as u8, Ordering::Release);
            self.half_open_claimed.store(false, Ordering::Release);
        }
    }

    /// A failed call that should count against the breaker (not a 413).
    pub(crate) fn record_failure(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                // Probe failed: reopen.
                self.open();
            }
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold as u64 {
                    self.open();
                }
            }
            CircuitState::Open => {
                // Already open; nothing to do.
            }
        }
    }

    fn open(&self) {
        self.opened_at_millis
            .store(self.now_millis(), Ordering::Release);
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        self.half_open_claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let circuit = Circuit::new(CircuitBreakerConfig {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        });
        assert!(circuit.try_admit());
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Closed);
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Closed);
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(!circuit.try_admit());
    }

    #[test]
    fn success_resets_failure_streak() {
        let circuit = Circuit::new(CircuitBreakerConfig {
            failure_threshold: 2,
            open_timeout: Duration::from_secs(30),
        });
        circuit.record_failure();
        circuit.record_success();
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_success_closes_breaker() {
        let circuit = Circuit::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_millis(1),
        });
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(5));
        assert!(circuit.try_admit());
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        circuit.record_success();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let circuit = Circuit::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_millis(1),
        });
        circuit.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(circuit.try_admit());
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[test]
    fn only_one_half_open_probe_admitted() {
        let circuit = Circuit::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_millis(1),
        });
        circuit.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(circuit.try_admit());
        // A second concurrent attempt must not also be admitted.
        assert!(!circuit.try_admit());
    }
}

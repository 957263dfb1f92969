//! [`RetryPolicy`]: the immutable configuration a [`crate::RetryController`]
//! is built from.

use std::collections::HashSet;
use std::time::Duration;

/// Default HTTP statuses considered retriable absent explicit configuration.
pub const DEFAULT_RETRIABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Immutable retry policy. Build with [`RetryPolicyBuilder`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub(crate) max_attempts: usize,
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) jitter_fraction: f64,
    pub(crate) retriable_statuses: HashSet<u16>,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }

    pub fn is_status_retriable(&self, status: u16) -> bool {
        self.retriable_statuses.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicyBuilder::default().build()
    }
}

/// Builder for [`RetryPolicy`]: defaults, then selective overrides.
pub struct RetryPolicyBuilder {
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
    jitter_fraction: f64,
    retriable_statuses: HashSet<u16>,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            jitter_fraction: 1.0,
            retriable_statuses: DEFAULT_RETRIABLE_STATUSES.into_iter().collect(),
        }
    }
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, n: usize) -> Self {
        assert!(n >= 1, "max_attempts must be >= 1");
        self.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, d: Duration) -> Self {
        assert!(d > Duration::ZERO, "initial_delay must be > 0");
        self.initial_delay = d;
        self
    }

    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    pub fn jitter_fraction(mut self, f: f64) -> Self {
        assert!((0.0..=1.0).contains(&f), "jitter_fraction must be in [0,1]");
        self.jitter_fraction = f;
        self
    }

    pub fn retriable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retriable_statuses = statuses.into_iter().collect();
        self
    }

    pub fn build(self) -> RetryPolicy {
        assert!(
            self.max_delay >= self.initial_delay,
            "max_delay must be >= initial_delay"
        );
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            jitter_fraction: self.jitter_fraction,
            retriable_statuses: self.retriable_statuses,
        }
    }
}

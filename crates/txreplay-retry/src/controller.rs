//! [`RetryController`]: decides, per attempt, whether to retry and how
//! long to sleep.

use crate::backoff::{apply_hint, next_delay, RetryAfterHint};
use crate::events::RetryEvent;
use crate::policy::RetryPolicy;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use txreplay_core::{Error, EventListeners, FnListener};

/// What a single attempt produced, from the retry controller's point of
/// view: either the caller's value, or a failure carrying enough context
/// to classify retriability.
pub enum Attempt<T> {
    Success(T),
    Failure(AttemptFailure),
}

pub struct AttemptFailure {
    pub error: Error,
    /// The HTTP status observed for this attempt, if any.
    pub status: Option<u16>,
    /// A server-supplied `Retry-After` hint, if any.
    pub retry_after: Option<RetryAfterHint>,
}

impl AttemptFailure {
    pub fn new(error: Error) -> Self {
        Self {
            error,
            status: None,
            retry_after: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, hint: RetryAfterHint) -> Self {
        self.retry_after = Some(hint);
        self
    }
}

pub struct RetryController {
    policy: RetryPolicy,
    name: String,
    listeners: EventListeners<RetryEvent>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            name: "<unnamed>".to_string(),
            listeners: EventListeners::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event: &RetryEvent| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an observed failure is eligible for retry at all. Status,
    /// if present, is checked against the policy's retriable-status set
    /// in addition to the error kind.
    pub fn should_retry(&self, error: &Error, status: Option<u16>) -> bool {
        if let Some(status) = status {
            if self.policy.is_status_retriable(status) {
                return true;
            }
        }
        error.is_retriable_kind()
    }

    /// Runs `attempt` (1-indexed) repeatedly until it succeeds, exhausts
    /// `max_attempts`, the error is not retriable, or `cancel` fires.
    /// The jittered sleep between attempts is the only suspension point
    /// owned by this controller; `attempt` itself must honor `cancel` for
    /// in-flight I/O.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut attempt: F) -> Result<T, Error>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut rng = rand::thread_rng();
        let mut prior_delay = Duration::ZERO;
        let mut attempts = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::connection_failed(format!(
                    "{}: cancelled before attempt",
                    self.name
                )));
            }

            attempts += 1;
            match attempt(attempts).await {
                Attempt::Success(value) => {
                    self.listeners.emit(&RetryEvent::Success {
                        attempts,
                        at: Instant::now(),
                    });
                    #[cfg(feature = "metrics")]
                    metrics::counter!("retry_attempts_total", "outcome" => "success").increment(1);
                    return Ok(value);
                }
                Attempt::Failure(failure) => {
                    if !self.should_retry(&failure.error, failure.status) {
                        self.listeners
                            .emit(&RetryEvent::NotRetriable { at: Instant::now() });
                        return Err(failure.error);
                    }

                    if attempts >= self.policy.max_attempts() {
                        self.listeners.emit(&RetryEvent::Exhausted {
                            attempts,
                            at: Instant::now(),
                        });
                        #[cfg(feature = "metrics")]
                        metrics::counter!("retry_attempts_total", "outcome" => "exhausted")
                            .increment(1);
                        return Err(failure.error);
                    }

                    let computed = next_delay(&self.policy, prior_delay, &mut rng);
                    let delay = apply_hint(&self.policy, computed, failure.retry_after);
                    prior_delay = delay;

                    self.listeners.emit(&RetryEvent::Retry {
                        attempt: attempts,
                        delay,
                        at: Instant::now(),
                    });
                    #[cfg(feature = "tracing")]
                    tracing::debug!(name = %self.name, attempt = attempts, ?delay, "retrying");

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            self.listeners
                                .emit(&RetryEvent::Cancelled { at: Instant::now() });
                            return Err(Error::connection_failed(format!(
                                "{}: cancelled during backoff sleep",
                                self.name
                            )));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn succeeds_without_retry() {
        let controller = RetryController::new(RetryPolicy::default());
        let cancel = CancellationToken::new();
        let result: Result<u32, Error> = controller
            .run(&cancel, |_attempt| async { Attempt::Success(42) })
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1))
            .max_attempts(5)
            .build();
        let controller = RetryController::new(policy);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let result: Result<u32, Error> = controller
            .run(&cancel, move |attempt| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Attempt::Failure(AttemptFailure::new(Error::timeout("slow")))
                    } else {
                        Attempt::Success(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_nonretriable_error() {
        let controller = RetryController::new(RetryPolicy::default());
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let result: Result<u32, Error> = controller
            .run(&cancel, move |_attempt| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Attempt::Failure(AttemptFailure::new(Error::validation_failed("bad key")))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1))
            .max_attempts(3)
            .build();
        let controller = RetryController::new(policy);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let result: Result<u32, Error> = controller
            .run(&cancel, move |_attempt| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Attempt::Failure(AttemptFailure::new(Error::connection_failed("down")))
                }
            })
            .await;
        assert!(result.unwrap_err().is(txreplay_core::RPC_CONNECTION_FAILED));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_during_sleep_returns_immediately() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_secs(30))
            .max_attempts(5)
            .build();
        let controller = RetryController::new(policy);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel2.cancel();
        });
        let started = Instant::now();
        let result: Result<u32, Error> = controller
            .run(&cancel, |_attempt| async {
                Attempt::Failure(AttemptFailure::new(Error::timeout("slow")))
            })
            .await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn retriable_status_in_configured_set_is_retried() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1))
            .retriable_statuses([599])
            .max_attempts(2)
            .build();
        let controller = RetryController::new(policy);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let _: Result<u32, Error> = controller
            .run(&cancel, move |_attempt| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Attempt::Failure(
                        AttemptFailure::new(Error::server_error("weird")).with_status(599),
                    )
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

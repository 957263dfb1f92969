use std::time::{Duration, Instant};
use txreplay_core::RpcEvent;

/// Observability events emitted by the retry controller.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A retry is about to be attempted after `delay`.
    Retry {
        attempt: usize,
        delay: Duration,
        at: Instant,
    },
    /// The operation succeeded, possibly after retries.
    Success { attempts: usize, at: Instant },
    /// All attempts were exhausted.
    Exhausted { attempts: usize, at: Instant },
    /// An error occurred but the retry predicate said not to retry.
    NotRetriable { at: Instant },
    /// The sleep (or the attempt) was cancelled.
    Cancelled { at: Instant },
}

impl RpcEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::NotRetriable { .. } => "not_retriable",
            RetryEvent::Cancelled { .. } => "cancelled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { at, .. }
            | RetryEvent::Success { at, .. }
            | RetryEvent::Exhausted { at, .. }
            | RetryEvent::NotRetriable { at }
            | RetryEvent::Cancelled { at } => *at,
        }
    }
}

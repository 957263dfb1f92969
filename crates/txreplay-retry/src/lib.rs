//! Retry controller for the txreplay RPC access layer.
//!
//! Given an attempt closure, [`RetryController::run`] decides whether to
//! retry and how long to sleep: full-jitter exponential backoff, with
//! server `Retry-After` hints overriding the computed delay.

mod backoff;
mod controller;
mod events;
mod policy;

pub use backoff::{apply_hint, next_delay, parse_retry_after, RetryAfterHint};
pub use controller::{Attempt, AttemptFailure, RetryController};
pub use events::RetryEvent;
pub use policy::{RetryPolicy, RetryPolicyBuilder, DEFAULT_RETRIABLE_STATUSES};

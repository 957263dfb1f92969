//! Full-jitter exponential backoff and `Retry-After` parsing.

use crate::policy::RetryPolicy;
use rand::Rng;
use std::time::{Duration, SystemTime};

/// Computes the next delay using full jitter.
///
/// `next = min(max_delay, 2 * prior_delay)`; the returned delay is a
/// uniform random draw in `[0, next * (1 + jitter_fraction))`. Passing a
/// `prior_delay` of `Duration::ZERO` on the first attempt yields a next of
/// `policy.initial_delay()` (since `2*0` would otherwise collapse to zero).
pub fn next_delay(policy: &RetryPolicy, prior_delay: Duration, rng: &mut impl Rng) -> Duration {
    let doubled = if prior_delay.is_zero() {
        policy.initial_delay()
    } else {
        prior_delay.saturating_mul(2)
    };
    let bounded = doubled.min(policy.max_delay());

    let upper = bounded.as_secs_f64() * (1.0 + policy.jitter_fraction());
    if upper <= 0.0 {
        return Duration::ZERO;
    }
    let sampled = rng.gen_range(0.0..upper);
    Duration::from_secs_f64(sampled)
}

/// A server-supplied delay hint, parsed from a `Retry-After` header.
/// Overrides the computed backoff, capped at `policy.max_delay()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryAfterHint(pub Duration);

/// Parses a `Retry-After` header value, which per HTTP may be either an
/// integer number of seconds or an HTTP-date. Unknown formats are not an
/// error; the caller falls back to policy backoff.
pub fn parse_retry_after(value: &str) -> Option<RetryAfterHint> {
    let trimmed = value.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(RetryAfterHint(Duration::from_secs(secs)));
    }
    if let Ok(when) = httpdate::parse_http_date(trimmed) {
        let now = SystemTime::now();
        let delay = when.duration_since(now).unwrap_or(Duration::ZERO);
        return Some(RetryAfterHint(delay));
    }
    None
}

/// Applies a server hint on top of the computed backoff: the hint wins,
/// but is capped at `policy.max_delay()`.
pub fn apply_hint(policy: &RetryPolicy, computed: Duration, hint: Option<RetryAfterHint>) -> Duration {
    match hint {
        Some(RetryAfterHint(d)) => d.min(policy.max_delay()),
        None => computed,
    }
}

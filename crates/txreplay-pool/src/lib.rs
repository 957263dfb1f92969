//! The endpoint pool and per-endpoint circuit breaker.

mod circuit;
mod pool;

pub use circuit::{CircuitBreakerConfig, CircuitState};
pub use pool::{Endpoint, Pool};

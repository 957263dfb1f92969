//! The request orchestrator: the five public operations
//! `FetchTransaction`, `FetchLedgerEntries`, `Simulate`, `SendTransaction`,
//! `Health`, built on the pool/retry/transport/cache/verify stack.

mod cache_key;
mod orchestrator;
mod single_flight;
mod types;
mod wire;

pub use orchestrator::{Orchestrator, OrchestratorConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_WORKERS, DEFAULT_TRANSACTION_TTL};
pub use types::{Liveness, SimulateOptions, TransactionResult};

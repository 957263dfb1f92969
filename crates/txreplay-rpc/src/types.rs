//! Public request/response types for the orchestrator's operations.
//! Payloads stay opaque base64/XDR; this layer never decodes them beyond
//! what the entry verifier validates.

use serde::{Deserialize, Serialize};

/// `FetchTransaction`'s result: envelope, result, and result-meta, each
/// opaque base64 XDR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub envelope: String,
    pub result: String,
    pub result_meta: String,
}

/// Options for `Simulate`.
#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    pub mock_base_fee: Option<u64>,
    pub min_protocol_version: Option<u32>,
}

/// `Health`'s result.
#[derive(Debug, Clone, Deserialize)]
pub struct Liveness {
    pub status: String,
    #[serde(default, rename = "latestLedger")]
    pub latest_ledger: Option<u64>,
}

//! Cache-key construction: built by the orchestrator, not the cache
//! itself.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use txreplay_core::Network;

pub fn transaction_key(network: Network, hash: &str) -> String {
    format!("txn:{network}:{hash}")
}

/// `entries:<network>:<hash-of-sorted-keys>`, one row per dispatched batch.
pub fn ledger_entries_key(network: Network, keys: &[String]) -> String {
    let mut sorted: Vec<&str> = keys.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    for key in &sorted {
        hasher.update(key.as_bytes());
        hasher.update(b"\0");
    }
    format!("entries:{network}:{}", BASE64.encode(hasher.finalize()))
}

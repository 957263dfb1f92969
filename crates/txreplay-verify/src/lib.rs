//! Validates `FetchLedgerEntries` responses against the keys that were
//! requested, before the batch result reaches a caller.
//!
//! Value payloads (XDR) are treated as opaque base64 here; only the echoed
//! *keys* are structurally checked.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use txreplay_core::Error;

/// One entry as returned by the remote node: an echoed key and its opaque
/// (base64) value.
#[derive(Debug, Clone)]
pub struct LedgerEntryResult {
    pub key: String,
    pub value: String,
}

/// Checks `returned` against `requested_keys` and, if every requirement
/// holds, returns the `key -> value` map a caller sees.
///
/// - every requested key must appear among the returned entries' echoed
///   keys (missing key fails with the key named in the message)
/// - an echoed key must equal the requested spelling byte-for-byte
/// - an echoed key must base64-decode and decode as a well-formed XDR
///   structure (validated, not deeply parsed — see [`structurally_valid_key`])
///
/// Duplicate requested keys are treated as one requirement. Digests of the
/// (decoded) key bytes are logged for operator debugging, never included in
/// the returned map.
pub fn verify_entries(
    requested_keys: &[String],
    returned: &[LedgerEntryResult],
) -> Result<HashMap<String, String>, Error> {
    let mut unique_keys: Vec<&String> = Vec::with_capacity(requested_keys.len());
    for k in requested_keys {
        if !unique_keys.iter().any(|u| *u == k) {
            unique_keys.push(k);
        }
    }

    let mut result = HashMap::with_capacity(unique_keys.len());
    for (i, requested) in unique_keys.iter().enumerate() {
        let entry = returned
            .get(i)
            .ok_or_else(|| Error::validation_failed(format!("requested key {requested} missing from response")))?;

        if &entry.key != *requested {
            return Err(Error::validation_failed(format!(
                "echoed key {} does not match requested key {requested} byte-for-byte",
                entry.key
            )));
        }

        let decoded = BASE64
            .decode(entry.key.as_bytes())
            .map_err(|_| Error::validation_failed(format!("key {} is not valid base64", entry.key)))?;
        if !structurally_valid_key(&decoded) {
            return Err(Error::validation_failed(format!(
                "key {} did not decode as a well-formed ledger-entry key",
                entry.key
            )));
        }
        log_key_digest(&entry.key, &decoded);

        result.insert((*requested).clone(), entry.value.clone());
    }
    Ok(result)
}

/// Minimal structural validation of a decoded XDR key: non-empty and
/// 4-byte aligned, matching XDR's fixed-unit encoding. Deep decoding of the
/// XDR union is out of scope here.
fn structurally_valid_key(decoded: &[u8]) -> bool {
    !decoded.is_empty() && decoded.len() % 4 == 0
}

#[cfg(feature = "tracing")]
fn log_key_digest(encoded_key: &str, decoded: &[u8]) {
    let digest = Sha256::digest(decoded);
    tracing::debug!(key = encoded_key, digest = %hex(&digest), "verified ledger-entry key");
}

#[cfg(not(feature = "tracing"))]
fn log_key_digest(_encoded_key: &str, decoded: &[u8]) {
    let _ = Sha256::digest(decoded);
}

#[cfg(feature = "tracing")]
fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

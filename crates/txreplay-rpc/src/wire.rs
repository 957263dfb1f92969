//! Deserialization shapes for the upstream JSON-RPC methods this layer
//! consumes. Values stay opaque base64/XDR; only the envelope around
//! them is parsed.

use serde::Deserialize;
use serde_json::Value;
use txreplay_core::Error;
use txreplay_verify::LedgerEntryResult;

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub status: String,
    #[serde(default, rename = "envelopeXdr")]
    pub envelope_xdr: Option<String>,
    #[serde(default, rename = "resultXdr")]
    pub result_xdr: Option<String>,
    #[serde(default, rename = "resultMetaXdr")]
    pub result_meta_xdr: Option<String>,
}

pub fn parse_transaction(value: Value, hash: &str) -> Result<RawTransaction, Error> {
    let raw: RawTransaction = serde_json::from_value(value).map_err(Error::unmarshal_failed)?;
    if raw.status.eq_ignore_ascii_case("not_found") {
        return Err(Error::transaction_not_found(hash));
    }
    Ok(raw)
}

#[derive(Debug, Clone, Deserialize)]
struct RawLedgerEntry {
    key: String,
    #[serde(rename = "xdr")]
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLedgerEntriesResponse {
    #[serde(default)]
    entries: Vec<RawLedgerEntry>,
}

pub fn parse_ledger_entries(value: Value) -> Result<Vec<LedgerEntryResult>, Error> {
    let raw: RawLedgerEntriesResponse = serde_json::from_value(value).map_err(Error::unmarshal_failed)?;
    Ok(raw
        .entries
        .into_iter()
        .map(|e| LedgerEntryResult {
            key: e.key,
            value: e.value,
        })
        .collect())
}

//! The daemon's own JSON-RPC 2.0 envelope. Distinct from
//! `txreplay_transport`'s envelope, which is the
//! *outbound* shape this process uses to talk to upstream RPC servers:
//! this one is *inbound*, from whatever calls `POST /rpc`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DaemonError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonError {
    pub code: String,
    pub message: String,
}

impl DaemonResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, error: &txreplay_core::Error) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(DaemonError {
                code: error.code().to_string(),
                message: error.message().to_string(),
            }),
        }
    }
}

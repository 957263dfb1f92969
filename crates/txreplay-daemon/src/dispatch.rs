//! Tagged-variant dispatch table from a JSON-RPC method name to an
//! Orchestrator operation: one fixed enum variant per operation, matched
//! in a single place, instead of dynamic dispatch over method-name
//! strings.

use crate::wire::DaemonRequest;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use txreplay_core::Error;
use txreplay_rpc::{Orchestrator, SimulateOptions};

/// The operations the daemon exposes over `POST /rpc`. One variant per
/// Orchestrator method; no other dispatch path exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonMethod {
    FetchTransaction,
    FetchLedgerEntries,
    Simulate,
    SendTransaction,
    Health,
}

impl FromStr for DaemonMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetchTransaction" => Ok(DaemonMethod::FetchTransaction),
            "fetchLedgerEntries" => Ok(DaemonMethod::FetchLedgerEntries),
            "simulate" => Ok(DaemonMethod::Simulate),
            "sendTransaction" => Ok(DaemonMethod::SendTransaction),
            "health" => Ok(DaemonMethod::Health),
            other => Err(Error::validation_failed(format!("unsupported method {other:?}"))),
        }
    }
}

fn field<'a>(params: &'a Value, name: &str) -> Result<&'a Value, Error> {
    params
        .get(name)
        .ok_or_else(|| Error::validation_failed(format!("params.{name} is required")))
}

fn field_str<'a>(params: &'a Value, name: &str) -> Result<&'a str, Error> {
    field(params, name)?
        .as_str()
        .ok_or_else(|| Error::validation_failed(format!("params.{name} must be a string")))
}

/// Runs `request` against `orchestrator`, bounding the whole dispatch by
/// `request_timeout`: a request-scoped cancellation token fires once the
/// timeout elapses.
pub async fn dispatch(
    orchestrator: &Orchestrator,
    request: &DaemonRequest,
    request_timeout: Duration,
) -> Result<Value, Error> {
    let method = request.method.parse::<DaemonMethod>()?;
    let cancel = CancellationToken::new();
    let timeout_cancel = cancel.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(request_timeout).await;
        timeout_cancel.cancel();
    });

    let result = run_method(orchestrator, method, &request.params, &cancel).await;
    timer.abort();
    result
}

async fn run_method(
    orchestrator: &Orchestrator,
    method: DaemonMethod,
    params: &Value,
    cancel: &CancellationToken,
) -> Result<Value, Error> {
    match method {
        DaemonMethod::FetchTransaction => {
            let hash = field_str(params, "hash")?;
            let result = orchestrator.fetch_transaction(cancel, hash).await?;
            Ok(serde_json::to_value(result).map_err(Error::marshal_failed)?)
        }
        DaemonMethod::FetchLedgerEntries => {
            let keys_value = field(params, "keys")?;
            let keys: Vec<String> = keys_value
                .as_array()
                .ok_or_else(|| Error::validation_failed("params.keys must be an array"))?
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<String>>>()
                .ok_or_else(|| Error::validation_failed("params.keys must be an array of strings"))?;
            let result = orchestrator.fetch_ledger_entries(cancel, &keys).await?;
            Ok(serde_json::to_value(result).map_err(Error::marshal_failed)?)
        }
        DaemonMethod::Simulate => {
            let envelope = field_str(params, "transaction")?;
            let opts = SimulateOptions {
                mock_base_fee: params.get("mockBaseFee").and_then(Value::as_u64),
                min_protocol_version: params.get("minProtocolVersion").and_then(Value::as_u64).map(|v| v as u32),
            };
            orchestrator.simulate(cancel, envelope, opts).await
        }
        DaemonMethod::SendTransaction => {
            let envelope = field_str(params, "transaction")?;
            orchestrator.send_transaction(envelope).await
        }
        DaemonMethod::Health => {
            let liveness = orchestrator.health().await?;
            Ok(serde_json::to_value(LivenessWire::from(liveness)).map_err(Error::marshal_failed)?)
        }
    }
}

/// Serializable mirror of [`txreplay_rpc::Liveness`]: the orchestrator
/// type only derives `Deserialize` (it is parsed from upstream, not
/// returned by it), so the daemon's outbound shape is defined here.
#[derive(serde::Serialize)]
struct LivenessWire {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest_ledger: Option<u64>,
}

impl From<txreplay_rpc::Liveness> for LivenessWire {
    fn from(liveness: txreplay_rpc::Liveness) -> Self {
        Self {
            status: liveness.status,
            latest_ledger: liveness.latest_ledger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_method_is_a_validation_error() {
        let err = "notAMethod".parse::<DaemonMethod>().unwrap_err();
        assert!(err.is(txreplay_core::VALIDATION_FAILED));
    }

    #[test]
    fn every_documented_method_parses() {
        for name in ["fetchTransaction", "fetchLedgerEntries", "simulate", "sendTransaction", "health"] {
            assert!(name.parse::<DaemonMethod>().is_ok());
        }
    }
}

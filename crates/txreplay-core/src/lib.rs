//! Core infrastructure shared across the txreplay RPC access layer:
//! the stable error taxonomy, the ledger `Network` identifier, and a
//! lightweight event bus used for observability hooks.

mod error;
mod events;
mod network;

pub use error::{
    classify_http_status, Code, Error, CONFIG_ERROR, LEDGER_ARCHIVED, LEDGER_NOT_FOUND,
    RPC_ALL_ENDPOINTS_FAILED, RPC_CONNECTION_FAILED, RPC_MARSHAL_FAILED,
    RPC_RATE_LIMIT_EXCEEDED, RPC_REQUEST_TOO_LARGE, RPC_RESPONSE_TOO_LARGE, RPC_SERVER_ERROR,
    RPC_TIMEOUT, RPC_TRANSACTION_NOT_FOUND, RPC_UNMARSHAL_FAILED, UNAUTHORIZED,
    VALIDATION_FAILED,
};
pub use events::{EventListener, EventListeners, FnListener, RpcEvent};
pub use network::{Network, ParseNetworkError};

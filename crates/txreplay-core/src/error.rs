//! Stable, coded error taxonomy shared across the RPC access layer.
//!
//! Every operation in `txreplay-rpc` ultimately returns [`Error`]. Each
//! variant corresponds 1:1 to one of the stable codes in the design
//! document: matching on a sentinel code must keep working even if the
//! human-readable message changes, and the wrapped cause (if any) stays
//! reachable through [`std::error::Error::source`].

use std::fmt;

/// A stable error code. These strings are part of the external contract:
/// callers match on them, so they must not be renamed.
pub type Code = &'static str;

pub const RPC_CONNECTION_FAILED: Code = "RPC_CONNECTION_FAILED";
pub const RPC_TIMEOUT: Code = "RPC_TIMEOUT";
pub const RPC_ALL_ENDPOINTS_FAILED: Code = "RPC_ALL_ENDPOINTS_FAILED";
pub const RPC_SERVER_ERROR: Code = "RPC_SERVER_ERROR";
pub const RPC_RESPONSE_TOO_LARGE: Code = "RPC_RESPONSE_TOO_LARGE";
pub const RPC_REQUEST_TOO_LARGE: Code = "RPC_REQUEST_TOO_LARGE";
pub const RPC_RATE_LIMIT_EXCEEDED: Code = "RPC_RATE_LIMIT_EXCEEDED";
pub const RPC_MARSHAL_FAILED: Code = "RPC_MARSHAL_FAILED";
pub const RPC_UNMARSHAL_FAILED: Code = "RPC_UNMARSHAL_FAILED";
pub const RPC_TRANSACTION_NOT_FOUND: Code = "RPC_TRANSACTION_NOT_FOUND";
pub const LEDGER_NOT_FOUND: Code = "LEDGER_NOT_FOUND";
pub const LEDGER_ARCHIVED: Code = "LEDGER_ARCHIVED";
pub const VALIDATION_FAILED: Code = "VALIDATION_FAILED";
pub const CONFIG_ERROR: Code = "CONFIG_ERROR";
pub const UNAUTHORIZED: Code = "UNAUTHORIZED";

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A coded RPC-layer error.
///
/// Construct with the `Error::connection_failed(...)`-style helpers rather
/// than matching the struct fields directly; the fields are private so the
/// taxonomy can grow without breaking callers that only match on `.code()`.
#[derive(Debug)]
pub struct Error {
    code: Code,
    message: String,
    cause: Option<Cause>,
}

impl Error {
    fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    fn with_cause(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// The stable sentinel code for this error.
    pub fn code(&self) -> Code {
        self.code
    }

    /// True if this error's code matches `code`.
    pub fn is(&self, code: Code) -> bool {
        self.code == code
    }

    /// The human-readable message, without the `[CODE]` prefix `Display`
    /// adds.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Reconstructs an error from a stable code and message alone, with no
    /// wrapped cause. Used where an error must cross a boundary that only
    /// carries `Clone` data (e.g. handing a result to single-flight
    /// followers), and the cause chain cannot travel with it.
    pub fn from_code(code: Code, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(RPC_CONNECTION_FAILED, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RPC_TIMEOUT, message)
    }

    pub fn all_endpoints_failed(message: impl Into<String>) -> Self {
        Self::new(RPC_ALL_ENDPOINTS_FAILED, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(RPC_SERVER_ERROR, message)
    }

    /// `RESPONSE_TOO_LARGE` messages must name the URL and suggest reducing
    /// request scope.
    pub fn response_too_large(url: impl fmt::Display) -> Self {
        Self::new(
            RPC_RESPONSE_TOO_LARGE,
            format!(
                "response from {url} exceeded the size limit; reduce the request scope (fewer keys per batch, or a narrower simulation) and retry"
            ),
        )
    }

    /// `REQUEST_TOO_LARGE` messages must state the observed and allowed
    /// sizes in human units.
    pub fn request_too_large(observed_bytes: usize, allowed_bytes: usize) -> Self {
        Self::new(
            RPC_REQUEST_TOO_LARGE,
            format!(
                "request body is {} but the limit is {}",
                human_bytes(observed_bytes),
                human_bytes(allowed_bytes)
            ),
        )
    }

    pub fn rate_limit_exceeded(message: impl Into<String>) -> Self {
        Self::new(RPC_RATE_LIMIT_EXCEEDED, message)
    }

    pub fn marshal_failed(cause: impl Into<Cause>) -> Self {
        Self::new(RPC_MARSHAL_FAILED, "failed to marshal request payload").with_cause(cause)
    }

    pub fn unmarshal_failed(cause: impl Into<Cause>) -> Self {
        Self::new(RPC_UNMARSHAL_FAILED, "failed to unmarshal response payload").with_cause(cause)
    }

    pub fn transaction_not_found(hash: impl fmt::Display) -> Self {
        Self::new(
            RPC_TRANSACTION_NOT_FOUND,
            format!("transaction {hash} not found"),
        )
    }

    pub fn ledger_not_found(message: impl Into<String>) -> Self {
        Self::new(LEDGER_NOT_FOUND, message)
    }

    pub fn ledger_archived(message: impl Into<String>) -> Self {
        Self::new(LEDGER_ARCHIVED, message)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(VALIDATION_FAILED, message)
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(CONFIG_ERROR, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(UNAUTHORIZED, message)
    }

    /// Whether this error's code is in the default retriable set
    /// (connection-failed, timeout, rate-limit). Status-code-driven
    /// retriability (the configured HTTP status set) is decided by the
    /// Retry Controller, not here.
    pub fn is_retriable_kind(&self) -> bool {
        matches!(
            self.code,
            RPC_CONNECTION_FAILED | RPC_TIMEOUT | RPC_RATE_LIMIT_EXCEEDED
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}

fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Classification of an HTTP response into a taxonomy error.
/// `retry_after` is the parsed `Retry-After` header value, if any.
pub fn classify_http_status(status: u16, url: impl fmt::Display, body_hint: &str) -> Error {
    match status {
        429 => Error::rate_limit_exceeded(format!("endpoint {url} returned 429")),
        413 => Error::response_too_large(url),
        404 if body_hint.to_ascii_lowercase().contains("transaction") => {
            Error::transaction_not_found(body_hint)
        }
        400..=499 => Error::server_error(format!("endpoint {url} returned {status}: {body_hint}")),
        500..=599 => {
            Error::connection_failed(format!("endpoint {url} returned {status}: {body_hint}"))
        }
        _ => Error::server_error(format!("endpoint {url} returned unexpected status {status}")),
    }
}

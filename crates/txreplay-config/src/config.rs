//! The validated configuration surface: everything the daemon needs to
//! build a pool, transport, cache, and metrics sink.

use crate::source::RawConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use txreplay_core::{Error, Network};

/// `log-level` ∈ {trace,debug,info,warn,error}, default `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::config_error(format!(
                "log-level {other:?} is not one of trace, debug, info, warn, error"
            ))),
        }
    }
}

fn default_cache_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".erst").join("cache.db"),
        None => PathBuf::from(".erst/cache.db"),
    }
}

/// The validated §6 configuration surface.
#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub rpc_urls: Vec<String>,
    pub network: Network,
    pub rpc_token: Option<String>,
    pub request_timeout: Duration,
    pub log_level: LogLevel,
    pub cache_path: PathBuf,
    pub crash_reporting: bool,
    pub crash_endpoint: Option<String>,
    pub crash_sentry_dsn: Option<String>,
}

fn has_allowed_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Loads from the environment, overlaid onto an optional config file,
    /// and validates every field.
    pub fn load(path: Option<impl AsRef<std::path::Path>>) -> Result<Self, Error> {
        Self::from_raw(RawConfig::load(path)?)
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self, Error> {
        let rpc_url = raw
            .get("rpc-url")
            .map(str::to_string)
            .ok_or_else(|| Error::config_error("rpc-url is required"))?;
        if rpc_url.is_empty() || !has_allowed_scheme(&rpc_url) {
            return Err(Error::config_error(format!(
                "rpc-url {rpc_url:?} must be non-empty with scheme http or https"
            )));
        }

        let rpc_urls: Vec<String> = match raw.get("rpc-urls") {
            Some(list) => list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect(),
            None => vec![rpc_url.clone()],
        };
        for url in &rpc_urls {
            if !has_allowed_scheme(url) {
                return Err(Error::config_error(format!(
                    "rpc-urls entry {url:?} must have scheme http or https"
                )));
            }
        }

        let network: Network = raw
            .get("network")
            .unwrap_or("public")
            .parse()
            .map_err(|e: txreplay_core::ParseNetworkError| Error::config_error(e.to_string()))?;

        let rpc_token = raw.get("rpc-token").map(str::to_string);

        let request_timeout_secs: u64 = match raw.get("request-timeout") {
            Some(s) => s
                .parse()
                .map_err(|_| Error::config_error(format!("request-timeout {s:?} is not an integer")))?,
            None => 15,
        };
        if request_timeout_secs == 0 || request_timeout_secs > 300 {
            return Err(Error::config_error(format!(
                "request-timeout {request_timeout_secs} must be in (0, 300]"
            )));
        }

        let log_level = match raw.get("log-level") {
            Some(s) => s.parse()?,
            None => LogLevel::default(),
        };

        let cache_path = raw.get("cache-path").map(PathBuf::from).unwrap_or_else(default_cache_path);

        let crash_reporting = match raw.get("crash-reporting") {
            Some(s) => s
                .parse()
                .map_err(|_| Error::config_error(format!("crash-reporting {s:?} is not a boolean")))?,
            None => false,
        };
        let crash_endpoint = raw.get("crash-endpoint").map(str::to_string);
        let crash_sentry_dsn = raw.get("crash-sentry-dsn").map(str::to_string);

        if crash_reporting && crash_endpoint.is_none() && crash_sentry_dsn.is_none() {
            return Err(Error::config_error(
                "crash-reporting is enabled but neither crash-endpoint nor crash-sentry-dsn is set",
            ));
        }
        if let Some(dsn) = &crash_sentry_dsn {
            if !dsn.starts_with("https://") {
                return Err(Error::config_error(format!("crash-sentry-dsn {dsn:?} must be an https URL")));
            }
        }

        Ok(Self {
            rpc_url,
            rpc_urls,
            network,
            rpc_token,
            request_timeout: Duration::from_secs(request_timeout_secs),
            log_level,
            cache_path,
            crash_reporting,
            crash_endpoint,
            crash_sentry_dsn,
        })
    }
}

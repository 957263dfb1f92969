//! Loads and validates the configuration surface:
//! `rpc-url`/`rpc-urls`/`network`/`rpc-token`/`request-timeout`/
//! `log-level`/`cache-path`/`crash-reporting`/`crash-endpoint`/
//! `crash-sentry-dsn`, from environment variables and an optional
//! `key = value` text file.

mod config;
mod source;

pub use config::{Config, LogLevel};
pub use source::RawConfig;

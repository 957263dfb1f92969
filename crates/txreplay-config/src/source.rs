//! Reads the raw key/value configuration surface from the process
//! environment and an optional text file, before any validation.

use std::collections::HashMap;
use std::path::Path;
use txreplay_core::Error;

/// The recognized keys, in their canonical kebab-case spelling.
pub const KEYS: [&str; 9] = [
    "rpc-url",
    "rpc-urls",
    "network",
    "rpc-token",
    "request-timeout",
    "log-level",
    "cache-path",
    "crash-reporting",
    "crash-endpoint",
];

/// Unvalidated key/value pairs, collected from the environment and/or a
/// file. Environment variables win over file entries for the same key.
#[derive(Debug, Default, Clone)]
pub struct RawConfig {
    values: HashMap<String, String>,
}

impl RawConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    fn merge(&mut self, other: RawConfig) {
        for (k, v) in other.values {
            self.values.entry(k).or_insert(v);
        }
    }

    /// Reads every recognized key from an environment variable named
    /// `RPC_URL`, `RPC_URLS`, `CRASH_SENTRY_DSN`, etc. — the kebab-case key
    /// upper-cased with `-` replaced by `_`.
    pub fn from_env() -> Self {
        let mut raw = Self::default();
        for key in KEYS.iter().chain(["crash-sentry-dsn"].iter()) {
            let var = key.to_ascii_uppercase().replace('-', "_");
            if let Ok(value) = std::env::var(&var) {
                raw.insert(*key, value);
            }
        }
        raw
    }

    /// Parses a simple `key = value` text file: blank lines and lines
    /// starting with `#` are ignored; keys are taken verbatim (kebab-case).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config_error(format!("failed to read config file {}: {e}", path.as_ref().display())))?;
        let mut raw = Self::default();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::config_error(format!(
                    "config file {}: line {} is not `key = value`",
                    path.as_ref().display(),
                    lineno + 1
                )));
            };
            raw.insert(key.trim(), value.trim());
        }
        Ok(raw)
    }

    /// Loads from a file (if `path` is given and exists) then overlays the
    /// environment, which takes precedence on conflicting keys.
    pub fn load(path: Option<impl AsRef<Path>>) -> Result<Self, Error> {
        let mut raw = Self::from_env();
        if let Some(path) = path {
            if path.as_ref().exists() {
                let file = Self::from_file(path)?;
                raw.merge(file);
            }
        }
        Ok(raw)
    }
}

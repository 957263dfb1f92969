//! The closed set of ledger realms the RPC layer can talk to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A ledger network identifier. Every cache row, metric sample, and
/// endpoint record carries one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Public,
    Test,
    Future,
    Standalone,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Public,
        Network::Test,
        Network::Future,
        Network::Standalone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Public => "public",
            Network::Test => "test",
            Network::Future => "future",
            Network::Standalone => "standalone",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognized network {0:?}; expected one of public, test, future, standalone")]
pub struct ParseNetworkError(String);

impl FromStr for Network {
    type Err = ParseNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" | "pubnet" | "mainnet" => Ok(Network::Public),
            "test" | "testnet" => Ok(Network::Test),
            "future" | "futurenet" => Ok(Network::Future),
            "standalone" | "local" => Ok(Network::Standalone),
            other => Err(ParseNetworkError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for n in Network::ALL {
            let parsed: Network = n.as_str().parse().unwrap();
            assert_eq!(parsed, n);
        }
    }

    #[test]
    fn rejects_unknown_network() {
        assert!("mars".parse::<Network>().is_err());
    }

    #[test]
    fn accepts_common_aliases() {
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Test);
        assert_eq!("futurenet".parse::<Network>().unwrap(), Network::Future);
    }
}

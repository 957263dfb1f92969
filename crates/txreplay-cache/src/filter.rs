//! The prune filter contract: at least one of older-than/network/all
//! must be set; an empty filter is rejected.

use std::time::Duration;
use txreplay_core::{Error, Network};

#[derive(Debug, Clone, Default)]
pub struct PruneFilter {
    older_than: Option<Duration>,
    network: Option<Network>,
    all: bool,
}

impl PruneFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn older_than(mut self, d: Duration) -> Self {
        self.older_than = Some(d);
        self
    }

    pub fn network(mut self, n: Network) -> Self {
        self.network = Some(n);
        self
    }

    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.older_than.is_none() && self.network.is_none() && !self.all {
            return Err(Error::validation_failed(
                "prune filter must set at least one of older-than, network, or all",
            ));
        }
        Ok(())
    }

    pub(crate) fn older_than_secs(&self) -> Option<i64> {
        self.older_than.map(|d| d.as_secs() as i64)
    }

    pub(crate) fn network_name(&self) -> Option<&'static str> {
        self.network.map(|n| n.as_str())
    }

    pub(crate) fn is_all(&self) -> bool {
        self.all
    }
}

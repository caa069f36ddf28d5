//! Per-request cache configuration
//!
//! Passed through `execute()` to the network collaborator untouched; the
//! cache itself does not interpret these options.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::value::Value;

/// Cache-control options for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheConfig {
    /// Fetch from the network, bypassing any cache-aware short-circuit
    pub force: bool,
    /// Re-issue the request on this interval
    pub poll_interval: Option<Duration>,
    /// Free-form options for the network layer
    pub metadata: BTreeMap<String, Value>,
}

impl CacheConfig {
    /// Config that forces a network fetch
    pub fn force() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

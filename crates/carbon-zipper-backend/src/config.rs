//! Configuration for a [`crate::Backend`].

use std::time::Duration;

/// Configuration for one remote store.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub(crate) address: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) max_metrics_per_request: usize,
    pub(crate) learned_paths_ttl: Duration,
}

impl BackendConfig {
    /// Creates a builder for the backend reachable at `address` (e.g.
    /// `http://10.0.0.1:8080`).
    pub fn builder(address: impl Into<String>) -> BackendConfigBuilder {
        BackendConfigBuilder::new(address)
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Builder for [`BackendConfig`].
pub struct BackendConfigBuilder {
    address: String,
    timeout: Option<Duration>,
    max_metrics_per_request: usize,
    learned_paths_ttl: Duration,
}

impl BackendConfigBuilder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: None,
            max_metrics_per_request: 0,
            learned_paths_ttl: Duration::from_secs(600),
        }
    }

    /// Wraps every call's context with this timeout when positive (§4.E
    /// "setTimeout"). `None` (the default) leaves the caller's deadline
    /// untouched.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// A per-request metric cap; `0` (the default) means unlimited, and
    /// `MultiFetchRequest`s are dispatched unchanged (§4.F "Request
    /// splitting").
    pub fn max_metrics_per_request(mut self, cap: usize) -> Self {
        self.max_metrics_per_request = cap;
        self
    }

    /// TTL for the learned-paths hint cache.
    pub fn learned_paths_ttl(mut self, ttl: Duration) -> Self {
        self.learned_paths_ttl = ttl;
        self
    }

    pub fn build(self) -> BackendConfig {
        BackendConfig {
            address: self.address,
            timeout: self.timeout,
            max_metrics_per_request: self.max_metrics_per_request,
            learned_paths_ttl: self.learned_paths_ttl,
        }
    }
}

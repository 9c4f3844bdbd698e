//! Configuration for the [`crate::PathCache`].

use std::time::Duration;

/// Configuration for a [`crate::PathCache`].
#[derive(Clone, Copy, Debug)]
pub struct PathCacheConfig {
    pub(crate) ttl: Duration,
}

impl PathCacheConfig {
    /// Creates a builder, defaulting to a 10 minute expiry (a typical
    /// "path cache expiry seconds" value for the §6 configuration surface).
    pub fn builder() -> PathCacheConfigBuilder {
        PathCacheConfigBuilder::new()
    }
}

/// Builder for [`PathCacheConfig`].
pub struct PathCacheConfigBuilder {
    ttl: Duration,
}

impl PathCacheConfigBuilder {
    /// Default builder.
    pub fn new() -> Self {
        Self { ttl: Duration::from_secs(600) }
    }

    /// Sets the entry TTL. Every `set`/`append` call uses this same TTL;
    /// the cache has no size cap, only time-based eviction (§4.C).
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> PathCacheConfig {
        PathCacheConfig { ttl: self.ttl }
    }
}

impl Default for PathCacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

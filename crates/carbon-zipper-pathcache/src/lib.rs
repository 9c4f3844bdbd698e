//! TLD routing cache: `prefix -> [backend...]` (§4.C).
//!
//! `PathCache` is purely a routing *hint*. Every invariant in the
//! specification is phrased so that an empty or stale cache only enlarges
//! the fan-out, never changes the merged result (§3) — callers must always
//! be prepared to fall back to "every backend" when a prefix is missing.
//!
//! Built on [`moka::sync::Cache`], grounded on the same dependency the
//! `doublewordai` control-layer uses for its onwards-routing cache
//! (`dwctl::sync::onwards_config`, `dwctl::metrics::cache_info`).

mod config;

pub use config::{PathCacheConfig, PathCacheConfigBuilder};

use moka::sync::Cache;
use std::sync::Arc;

/// Maps a metric TLD prefix to the backends known to serve it.
pub struct PathCache {
    cache: Cache<String, Arc<[String]>>,
    config: PathCacheConfig,
}

impl PathCache {
    /// Creates a path cache with no size cap, evicting purely on TTL.
    pub fn new(config: PathCacheConfig) -> Self {
        let cache = Cache::builder().time_to_live(config.ttl).build();
        Self { cache, config }
    }

    /// Looks up the backends registered for `prefix`. Readers observe either
    /// a fully-formed list or nothing — never a torn write, because each
    /// entry is an immutable `Arc<[String]>` swapped in atomically.
    pub fn get(&self, prefix: &str) -> Option<Arc<[String]>> {
        self.cache.get(prefix)
    }

    /// Replaces the backend list for `prefix`, resetting its TTL.
    pub fn set(&self, prefix: impl Into<String>, backends: Vec<String>) {
        self.cache.insert(prefix.into(), Arc::from(backends.into_boxed_slice()));
    }

    /// Appends `backend` to `prefix`'s list (creating it if absent), used by
    /// the TLD prober which accumulates discoveries across backends (§4.F).
    pub fn append(&self, prefix: impl Into<String>, backend: impl Into<String>) {
        let prefix = prefix.into();
        let backend = backend.into();
        let mut updated: Vec<String> = self
            .cache
            .get(&prefix)
            .map(|existing| existing.to_vec())
            .unwrap_or_default();
        if !updated.iter().any(|b| b == &backend) {
            updated.push(backend);
        }
        self.cache.insert(prefix, Arc::from(updated.into_boxed_slice()));
    }

    /// Number of live (unexpired) entries. Approximate: moka evicts lazily.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

//! Learned-paths hint cache (§4.E, §3 invariant "only records paths
//! observed as leaves in successful responses").

use moka::sync::Cache;
use std::time::Duration;

/// A TTL'd set of leaf paths this backend has been observed to answer for.
/// Used only as a hint by [`crate::Backend::contains`].
pub struct LearnedPaths {
    cache: Cache<String, ()>,
}

impl LearnedPaths {
    pub fn new(ttl: Duration) -> Self {
        Self { cache: Cache::builder().time_to_live(ttl).build() }
    }

    /// Records `path` as a known leaf. Only call this for paths observed as
    /// leaves in a successful response — never for directories or errors.
    pub fn record(&self, path: impl Into<String>) {
        self.cache.insert(path.into(), ());
    }

    /// `true` if `path` has been observed (subject to TTL expiry).
    pub fn contains(&self, path: &str) -> bool {
        self.cache.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reports_membership() {
        let paths = LearnedPaths::new(Duration::from_secs(60));
        assert!(!paths.contains("a.b.c"));
        paths.record("a.b.c");
        assert!(paths.contains("a.b.c"));
    }
}

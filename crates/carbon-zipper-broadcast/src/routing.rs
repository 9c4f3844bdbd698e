//! Server selection (§4.F "Server selection (`chooseServers`)").
//!
//! Routing is always a hint: every correctness property in §3/§8 holds
//! identically whether [`choose_servers`] returns a precise subset or the
//! full backend list, so the fallback path is exercised by the same tests
//! as the precise one.

use carbon_zipper_backend::Backend;
use carbon_zipper_pathcache::PathCache;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The top-level domain of a dot-separated metric name: the prefix up to
/// (not including) the first `.`, or the whole name if it has none.
pub fn tld(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Selects the backends that should be asked about `names`. Unions the
/// `PathCache` entries for each name's TLD; if that union is empty (no
/// entries, or every entry expired), falls back to every backend in
/// `all`.
pub fn choose_servers(
    all: &[Arc<Backend>],
    path_cache: &PathCache,
    names: &[String],
) -> Vec<Arc<Backend>> {
    let mut selected: BTreeMap<String, Arc<Backend>> = BTreeMap::new();

    for name in names {
        let Some(candidates) = path_cache.get(tld(name)) else { continue };
        for address in candidates.iter() {
            if let Some(backend) = all.iter().find(|b| b.address() == address) {
                selected.insert(address.clone(), Arc::clone(backend));
            }
        }
    }

    if selected.is_empty() {
        all.to_vec()
    } else {
        selected.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbon_zipper_backend::BackendConfig;
    use carbon_zipper_limiter::{Limiter, LimiterConfig};
    use carbon_zipper_pathcache::PathCacheConfig;

    fn backend(addr: &str) -> Arc<Backend> {
        Arc::new(Backend::new(
            BackendConfig::builder(addr).build(),
            reqwest::Client::new(),
            Arc::new(Limiter::new(LimiterConfig::builder().build())),
        ))
    }

    #[test]
    fn tld_is_the_leading_dotless_segment() {
        assert_eq!(tld("a.b.c"), "a");
        assert_eq!(tld("solo"), "solo");
    }

    #[test]
    fn missing_prefix_falls_back_to_every_backend() {
        let all = vec![backend("b1"), backend("b2")];
        let path_cache = PathCache::new(PathCacheConfig::builder().build());
        let chosen = choose_servers(&all, &path_cache, &["c.y".to_string()]);
        assert_eq!(chosen.len(), 2);
    }

    #[test]
    fn known_prefix_narrows_to_its_registered_backends() {
        let all = vec![backend("b1"), backend("b2")];
        let path_cache = PathCache::new(PathCacheConfig::builder().build());
        path_cache.set("a", vec!["b1".to_string()]);

        let chosen = choose_servers(&all, &path_cache, &["a.x".to_string()]);
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].address(), "b1");
    }

    #[test]
    fn union_spans_every_requested_name() {
        let all = vec![backend("b1"), backend("b2"), backend("b3")];
        let path_cache = PathCache::new(PathCacheConfig::builder().build());
        path_cache.set("a", vec!["b1".to_string()]);
        path_cache.set("b", vec!["b2".to_string()]);

        let mut chosen: Vec<String> =
            choose_servers(&all, &path_cache, &["a.x".to_string(), "b.y".to_string()])
                .iter()
                .map(|b| b.address().to_string())
                .collect();
        chosen.sort();
        assert_eq!(chosen, vec!["b1".to_string(), "b2".to_string()]);
    }
}

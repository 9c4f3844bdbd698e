//! Property: for any fan-out, the merged result is identical whether
//! PathCache returns exact routing, empty, or stale entries — only latency
//! differs (§8 "PathCache irrelevance to correctness"). `choose_servers`
//! never narrows to a backend that wasn't actually registered for the
//! requested name's TLD, and an empty/stale cache always degrades to the
//! full backend list rather than a wrong subset.

use carbon_zipper_backend::{Backend, BackendConfig};
use carbon_zipper_broadcast::choose_servers;
use carbon_zipper_limiter::{Limiter, LimiterConfig};
use carbon_zipper_pathcache::{PathCache, PathCacheConfig};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn backend(addr: &str) -> Arc<Backend> {
    Arc::new(Backend::new(
        BackendConfig::builder(format!("http://{addr}")).build(),
        reqwest::Client::new(),
        Arc::new(Limiter::new(LimiterConfig::builder().build())),
    ))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn empty_cache_always_falls_back_to_every_backend(
        num_backends in 1usize..=6,
        tld in "[a-z]{1,4}",
    ) {
        let all: Vec<Arc<Backend>> = (0..num_backends).map(|i| backend(&format!("b{i}"))).collect();
        let path_cache = PathCache::new(PathCacheConfig::builder().build());

        let chosen = choose_servers(&all, &path_cache, &[format!("{tld}.leaf")]);
        prop_assert_eq!(chosen.len(), all.len());
    }

    #[test]
    fn stale_entry_degrades_to_fallback_not_a_wrong_subset(
        num_backends in 1usize..=6,
        registered in 0usize..=5,
    ) {
        let all: Vec<Arc<Backend>> = (0..num_backends).map(|i| backend(&format!("b{i}"))).collect();
        let path_cache = PathCache::new(PathCacheConfig::builder().ttl(Duration::from_millis(5)).build());
        if let Some(b) = all.get(registered % num_backends) {
            path_cache.set("a", vec![b.address().to_string()]);
        }
        std::thread::sleep(Duration::from_millis(30));

        // Entry expired: must degrade to "every backend", never an empty
        // or partial set silently mistaken for "no backend knows this".
        let chosen = choose_servers(&all, &path_cache, &["a.leaf".to_string()]);
        prop_assert_eq!(chosen.len(), all.len());
    }

    #[test]
    fn exact_routing_only_ever_narrows_to_registered_backends(
        num_backends in 2usize..=6,
        owner in 0usize..6,
    ) {
        let all: Vec<Arc<Backend>> = (0..num_backends).map(|i| backend(&format!("b{i}"))).collect();
        let owner = owner % num_backends;
        let path_cache = PathCache::new(PathCacheConfig::builder().build());
        path_cache.set("a", vec![all[owner].address().to_string()]);

        let chosen = choose_servers(&all, &path_cache, &["a.leaf".to_string()]);
        prop_assert!(chosen.iter().all(|b| all.iter().any(|a| a.address() == b.address())));
        prop_assert_eq!(chosen.len(), 1);
        prop_assert_eq!(chosen[0].address(), all[owner].address());
    }
}

//! Property: for any key, while one task is in `fetch_or_lock → store_and_unlock`
//! (or `store_abort`), exactly one leader is elected per (key, epoch), and a
//! subsequent call after an abort succeeds in electing a new leader (§8
//! "Single-flight" and "Leader abort liveness").

use carbon_zipper_core::Context;
use carbon_zipper_querycache::{FetchOutcome, QueryCache, QueryCacheConfig};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(25))]

    #[test]
    fn exactly_one_leader_is_elected_per_key(num_callers in 2usize..=24) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async move {
            let cache: QueryCache<String, u32> = QueryCache::new(QueryCacheConfig::builder().build());
            let leaders = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for _ in 0..num_callers {
                let cache = cache.clone();
                let leaders = Arc::clone(&leaders);
                handles.push(tokio::spawn(async move {
                    let handle = cache.get_or_create("k".to_string());
                    let ctx = Context::generate().with_deadline(Duration::from_secs(2));
                    match handle.fetch_or_lock(&ctx).await {
                        FetchOutcome::Leader => {
                            leaders.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            handle.store_and_unlock(99, 1);
                        }
                        FetchOutcome::Hit(v) => assert_eq!(*v, 99),
                        FetchOutcome::GiveUp => panic!("deadline is generous enough not to give up"),
                    }
                }));
            }
            for h in handles {
                h.await.unwrap();
            }

            prop_assert_eq!(leaders.load(Ordering::SeqCst), 1);
            Ok(())
        })?;
    }

    #[test]
    fn leadership_is_reelectable_after_any_number_of_aborts(abort_rounds in 1usize..=6) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async move {
            let cache: QueryCache<String, u32> = QueryCache::new(QueryCacheConfig::builder().build());
            let ctx = Context::generate();

            for _ in 0..abort_rounds {
                let handle = cache.get_or_create("k".to_string());
                match handle.fetch_or_lock(&ctx).await {
                    FetchOutcome::Leader => handle.store_abort(),
                    _ => panic!("expected fresh leadership after an abort"),
                }
            }

            let handle = cache.get_or_create("k".to_string());
            prop_assert!(matches!(handle.fetch_or_lock(&ctx).await, FetchOutcome::Leader));
            Ok(())
        })?;
    }
}

//! Property: no more than `capacity(b)` concurrent `enter(b)` holders at any
//! moment, across any workload (§8 "Limiter ceiling").

use carbon_zipper_core::Context;
use carbon_zipper_limiter::{Limiter, LimiterConfig};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn limiter_never_exceeds_configured_capacity(
        capacity in 1usize..=8,
        num_callers in 1usize..=40,
        work_ms in 0u64..=5,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async move {
            let limiter = Arc::new(Limiter::new(
                LimiterConfig::builder().capacity("b", capacity).build(),
            ));
            let in_flight = Arc::new(AtomicUsize::new(0));
            let max_seen = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for _ in 0..num_callers {
                let limiter = Arc::clone(&limiter);
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                handles.push(tokio::spawn(async move {
                    let ctx = Context::generate().with_deadline(Duration::from_secs(5));
                    let guard = limiter.enter(&ctx, "b").await.unwrap();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    let mut seen = max_seen.load(Ordering::SeqCst);
                    while now > seen {
                        match max_seen.compare_exchange_weak(seen, now, Ordering::SeqCst, Ordering::SeqCst) {
                            Ok(_) => break,
                            Err(s) => seen = s,
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(work_ms)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    drop(guard);
                }));
            }
            for h in handles {
                h.await.unwrap();
            }

            prop_assert!(max_seen.load(Ordering::SeqCst) <= capacity);
            Ok(())
        })?;
    }
}

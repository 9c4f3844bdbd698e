//! Per-backend concurrency limiter (§4.B).
//!
//! A single [`Limiter`] is shared across all backends of a `BroadcastGroup`;
//! each backend name gets its own token pool, so contention on one backend
//! never throttles another. This mirrors `tower_resilience_bulkhead`'s
//! semaphore-based service, generalized from "one semaphore per service
//! instance" to "one semaphore per key".
//!
//! # Example
//!
//! ```
//! use carbon_zipper_core::Context;
//! use carbon_zipper_limiter::{Limiter, LimiterConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = Limiter::new(LimiterConfig::builder().capacity("store-a", 2).build());
//! let ctx = Context::generate();
//! let guard = limiter.enter(&ctx, "store-a").await.unwrap();
//! assert_eq!(limiter.in_use("store-a"), 1);
//! drop(guard);
//! assert_eq!(limiter.in_use("store-a"), 0);
//! # }
//! ```

mod config;
mod error;
mod events;

pub use config::{LimiterConfig, LimiterConfigBuilder};
pub use error::LimiterError;
pub use events::LimiterEvent;

use carbon_zipper_core::Context;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[cfg(feature = "metrics")]
use metrics::gauge;

/// A bounded token pool keyed by backend name.
pub struct Limiter {
    capacities: HashMap<String, usize>,
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
    config: LimiterConfig,
}

impl Limiter {
    /// Creates a limiter from its configuration.
    pub fn new(config: LimiterConfig) -> Self {
        let capacities = config.capacities.clone();
        let semaphores = capacities
            .iter()
            .map(|(name, cap)| (name.clone(), Arc::new(Semaphore::new(*cap))))
            .collect();
        Self { capacities, semaphores: Mutex::new(semaphores), config }
    }

    /// The configured ceiling for `backend`, or `None` if it is unbounded.
    pub fn capacity(&self, backend: &str) -> Option<usize> {
        self.capacities.get(backend).copied()
    }

    /// Current number of outstanding holders for `backend`.
    pub fn in_use(&self, backend: &str) -> usize {
        match self.capacities.get(backend) {
            Some(cap) => {
                let guard = self.semaphores.lock();
                match guard.get(backend) {
                    Some(sem) => cap - sem.available_permits(),
                    None => 0,
                }
            }
            None => 0,
        }
    }

    fn semaphore_for(&self, backend: &str) -> Option<Arc<Semaphore>> {
        let cap = *self.capacities.get(backend)?;
        let mut guard = self.semaphores.lock();
        let sem = guard
            .entry(backend.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(cap)));
        Some(Arc::clone(sem))
    }

    /// Acquires one token for `backend`, or returns [`LimiterError::Deadline`]
    /// if `ctx` finishes first. Backends with no configured capacity succeed
    /// immediately.
    pub async fn enter(&self, ctx: &Context, backend: &str) -> Result<LimiterGuard, LimiterError> {
        let Some(sem) = self.semaphore_for(backend) else {
            return Ok(LimiterGuard { permit: None, backend: None, config: None });
        };

        let start = Instant::now();
        tokio::select! {
            biased;
            permit = sem.clone().acquire_owned() => {
                let permit = permit.expect("limiter semaphore is never closed");
                ctx.add_phase("limiter_wait", start);
                let in_use = self.in_use(backend);
                self.config.event_listeners.emit(&LimiterEvent::Acquired {
                    backend: backend.to_string(),
                    timestamp: Instant::now(),
                    in_use,
                });
                #[cfg(feature = "metrics")]
                gauge!("zipper_limiter_in_use", "backend" => backend.to_string()).set(in_use as f64);

                Ok(LimiterGuard {
                    permit: Some(permit),
                    backend: Some(backend.to_string()),
                    config: Some(self.config.clone()),
                })
            }
            _ = ctx.done() => {
                self.config.event_listeners.emit(&LimiterEvent::Rejected {
                    backend: backend.to_string(),
                    timestamp: Instant::now(),
                });
                Err(LimiterError::Deadline)
            }
        }
    }
}

/// Holds a single limiter slot. Dropping it (or calling [`LimiterGuard::leave`]
/// explicitly) releases the slot.
pub struct LimiterGuard {
    permit: Option<OwnedSemaphorePermit>,
    backend: Option<String>,
    config: Option<LimiterConfig>,
}

impl LimiterGuard {
    /// Releases the slot. Equivalent to dropping the guard; provided for
    /// call sites that want to name the release point explicitly, matching
    /// the `leave(ctx, name)` operation of §4.B.
    pub fn leave(self) {
        drop(self)
    }
}

impl Drop for LimiterGuard {
    fn drop(&mut self) {
        if let (Some(_permit), Some(backend), Some(config)) =
            (self.permit.take(), self.backend.take(), self.config.take())
        {
            config.event_listeners.emit(&LimiterEvent::Released {
                backend,
                timestamp: Instant::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn unbounded_backend_never_blocks() {
        let limiter = Limiter::new(LimiterConfig::builder().build());
        let ctx = Context::generate();
        let g1 = limiter.enter(&ctx, "anything").await.unwrap();
        let g2 = limiter.enter(&ctx, "anything").await.unwrap();
        drop(g1);
        drop(g2);
    }

    #[tokio::test]
    async fn enter_times_out_on_expired_context() {
        let limiter = Limiter::new(LimiterConfig::builder().capacity("b1", 1).build());
        let ctx = Context::generate();
        let _guard = limiter.enter(&ctx, "b1").await.unwrap();

        let waiter_ctx = Context::generate().with_deadline(Duration::from_millis(20));
        let err = limiter.enter(&waiter_ctx, "b1").await.unwrap_err();
        assert_eq!(err, LimiterError::Deadline);
    }

    #[tokio::test]
    async fn never_exceeds_configured_ceiling() {
        let limiter = Arc::new(Limiter::new(LimiterConfig::builder().capacity("b1", 2).build()));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            let concurrent = Arc::clone(&concurrent);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let ctx = Context::generate();
                let _guard = limiter.enter(&ctx, "b1").await.unwrap();
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn capacity_reports_configured_ceiling() {
        let limiter = Limiter::new(LimiterConfig::builder().capacity("b1", 5).build());
        assert_eq!(limiter.capacity("b1"), Some(5));
        assert_eq!(limiter.capacity("unconfigured"), None);
    }
}

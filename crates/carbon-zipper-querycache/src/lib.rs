//! Single-flight, size-bounded query cache (§4.D).
//!
//! `QueryCache` deduplicates concurrent fetches for the same key: the first
//! caller becomes the *leader* and does the work, every other caller
//! *joins* and waits for the leader's result instead of repeating it. This
//! is the same join/lead/release shape as
//! `tower_resilience_coalesce::InFlight<K, Res, E>`, rebuilt around an
//! explicit `Empty -> Pending -> Available` flag (§4.D's state machine)
//! instead of a broadcast channel, so a leader can `store_abort` and hand
//! leadership to the next caller without tearing down every waiter's
//! channel.
//!
//! Each [`QueryHandle`] holds only a [`std::sync::Weak`] reference back to
//! the cache's shared state (§9, cache-ownership open question): the cache
//! owns entries through `Arc`, handles never keep an evicted entry or its
//! parent cache alive, and dropping every handle for a key lets it be
//! collected once the cache itself drops the `Arc`.

mod config;
mod error;
mod events;

pub use config::{QueryCacheConfig, QueryCacheConfigBuilder};
pub use error::QueryCacheError;
pub use events::QueryCacheEvent;

use carbon_zipper_core::Context;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::Notify;

#[cfg(feature = "metrics")]
use metrics::gauge;

const EMPTY: u8 = 0;
const PENDING: u8 = 1;
const AVAILABLE: u8 = 2;

struct ItemState<V> {
    flag: AtomicU8,
    value: Mutex<Option<Arc<V>>>,
    signal: Mutex<Arc<Notify>>,
    created_at: Mutex<Option<Instant>>,
    size: Mutex<usize>,
}

impl<V> ItemState<V> {
    fn empty() -> Arc<Self> {
        Arc::new(Self {
            flag: AtomicU8::new(EMPTY),
            value: Mutex::new(None),
            signal: Mutex::new(Arc::new(Notify::new())),
            created_at: Mutex::new(None),
            size: Mutex::new(0),
        })
    }
}

struct Shared<K, V> {
    items: Mutex<HashMap<K, Arc<ItemState<V>>>>,
    max_entries: usize,
    ttl: Option<std::time::Duration>,
    size: std::sync::atomic::AtomicUsize,
    config: QueryCacheConfig,
}

/// A single-flight, TTL- and size-bounded cache keyed by `K`, storing
/// `Arc<V>` values.
pub struct QueryCache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for QueryCache<K, V> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + Into<String>,
{
    /// Creates a cache from its configuration.
    pub fn new(config: QueryCacheConfig) -> Self {
        let shared = Shared {
            items: Mutex::new(HashMap::new()),
            max_entries: config.max_entries,
            ttl: config.ttl,
            size: std::sync::atomic::AtomicUsize::new(0),
            config,
        };
        Self { shared: Arc::new(shared) }
    }

    /// Total accounted size across all `Available` entries.
    pub fn size(&self) -> usize {
        self.shared.size.load(Ordering::Relaxed)
    }

    /// Number of entries currently tracked (including `Pending` ones).
    pub fn len(&self) -> usize {
        self.shared.items.lock().len()
    }

    /// `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a handle for `key`, creating a fresh `Empty` entry if none
    /// exists. Expired entries (past their TTL) are reset to `Empty` in
    /// place so the next `fetch_or_lock` call gives a caller the chance to
    /// lead a refresh.
    pub fn get_or_create(&self, key: K) -> QueryHandle<K, V> {
        let mut items = self.shared.items.lock();

        if let Some(existing) = items.get(&key) {
            self.expire_if_stale(existing);
            return QueryHandle {
                key: key.clone(),
                item: Arc::clone(existing),
                shared: Arc::downgrade(&self.shared),
            };
        }

        let item = ItemState::empty();
        items.insert(key.clone(), Arc::clone(&item));
        let len = items.len();
        drop(items);

        if len > self.shared.max_entries {
            self.evict_one(&key);
        }

        QueryHandle { key, item, shared: Arc::downgrade(&self.shared) }
    }

    fn expire_if_stale(&self, item: &Arc<ItemState<V>>) {
        let Some(ttl) = self.shared.ttl else { return };
        if item.flag.load(Ordering::Acquire) != AVAILABLE {
            return;
        }
        let stale = item.created_at.lock().map(|t| t.elapsed() > ttl).unwrap_or(false);
        if !stale {
            return;
        }
        if item.flag.compare_exchange(AVAILABLE, EMPTY, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            let stale_size = std::mem::take(&mut *item.size.lock());
            self.shared.size.fetch_sub(stale_size, Ordering::Relaxed);
            *item.value.lock() = None;
        }
    }

    /// Evicts the oldest `Available` entry other than `protected`, if any,
    /// to make room for the new one just inserted. `Pending` entries are
    /// never evicted: their leader has no other way to hand back the slot.
    fn evict_one(&self, protected: &K) {
        let mut items = self.shared.items.lock();

        let mut victim: Option<K> = None;
        let mut oldest: Option<Instant> = None;
        for (k, item) in items.iter() {
            if k == protected || item.flag.load(Ordering::Acquire) != AVAILABLE {
                continue;
            }
            let created = item.created_at.lock().unwrap_or_else(Instant::now);
            let replace = match oldest {
                Some(o) => created < o,
                None => true,
            };
            if replace {
                oldest = Some(created);
                victim = Some(k.clone());
            }
        }

        let Some(victim) = victim else { return };
        if let Some(item) = items.remove(&victim) {
            let size = *item.size.lock();
            self.shared.size.fetch_sub(size, Ordering::Relaxed);
            self.shared.config.event_listeners.emit(&QueryCacheEvent::Evicted {
                key: victim.into(),
                timestamp: Instant::now(),
            });
        }
    }
}

/// Outcome of [`QueryHandle::fetch_or_lock`].
pub enum FetchOutcome<V> {
    /// A value was already available.
    Hit(Arc<V>),
    /// This caller must produce the value and call
    /// [`QueryHandle::store_and_unlock`] or [`QueryHandle::store_abort`].
    Leader,
    /// The caller's context finished before a value appeared.
    GiveUp,
}

/// A caller's view of one cache key.
pub struct QueryHandle<K, V> {
    key: K,
    item: Arc<ItemState<V>>,
    shared: Weak<Shared<K, V>>,
}

impl<K, V> QueryHandle<K, V>
where
    K: Eq + Hash + Clone + Into<String>,
{
    /// Resolves this key: returns the cached value, becomes the leader, or
    /// gives up once `ctx` finishes. Followers loop internally, re-checking
    /// the flag each time the leader's signal fires (whether by store or by
    /// abort), so a chain of aborting leaders never starves a waiter before
    /// its own deadline.
    pub async fn fetch_or_lock(&self, ctx: &Context) -> FetchOutcome<V> {
        loop {
            match self.item.flag.load(Ordering::Acquire) {
                AVAILABLE => {
                    let value = self.item.value.lock().clone();
                    return match value {
                        Some(v) => {
                            self.emit(QueryCacheEvent::Hit {
                                key: self.key_string(),
                                timestamp: Instant::now(),
                            });
                            FetchOutcome::Hit(v)
                        }
                        None => FetchOutcome::GiveUp,
                    };
                }
                EMPTY => {
                    if self
                        .item
                        .flag
                        .compare_exchange(EMPTY, PENDING, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.emit(QueryCacheEvent::Led {
                            key: self.key_string(),
                            timestamp: Instant::now(),
                        });
                        return FetchOutcome::Leader;
                    }
                    // Lost the race to become leader; re-check on the next
                    // loop iteration.
                }
                _pending => {
                    self.emit(QueryCacheEvent::Joined {
                        key: self.key_string(),
                        timestamp: Instant::now(),
                    });

                    let signal = self.item.signal.lock().clone();
                    let notified = signal.notified();

                    // The leader may have finished between our flag load
                    // above and registering interest in `notified`; recheck
                    // before awaiting so we never wait on a stale signal.
                    if self.item.flag.load(Ordering::Acquire) != PENDING {
                        continue;
                    }

                    tokio::select! {
                        biased;
                        _ = notified => continue,
                        _ = ctx.done() => return FetchOutcome::GiveUp,
                    }
                }
            }
        }
    }

    /// Stores `value`, making it visible to every waiter and to future
    /// callers until it expires or is evicted. `size` is an
    /// implementation-defined weight (e.g. byte length) counted toward the
    /// cache's size bound; callers may pass `0` if they do not track it.
    pub fn store_and_unlock(&self, value: V, size: usize) {
        *self.item.value.lock() = Some(Arc::new(value));
        *self.item.created_at.lock() = Some(Instant::now());
        *self.item.size.lock() = size;
        self.item.flag.store(AVAILABLE, Ordering::Release);
        self.item.signal.lock().notify_waiters();

        if let Some(shared) = self.shared.upgrade() {
            shared.size.fetch_add(size, Ordering::Relaxed);
            self.emit(QueryCacheEvent::Stored {
                key: self.key_string(),
                timestamp: Instant::now(),
                size,
            });
            #[cfg(feature = "metrics")]
            gauge!("zipper_querycache_size").set(shared.size.load(Ordering::Relaxed) as f64);
        }
    }

    /// Releases leadership without storing a value, resetting the entry to
    /// `Empty` on a fresh signal so the next caller to arrive can lead a
    /// retry. Every waiter blocked on the old signal wakes, sees `Empty`,
    /// and races to lead again.
    pub fn store_abort(&self) {
        *self.item.value.lock() = None;
        self.item.flag.store(EMPTY, Ordering::Release);
        let mut signal = self.item.signal.lock();
        let old = std::mem::replace(&mut *signal, Arc::new(Notify::new()));
        old.notify_waiters();
        drop(signal);

        self.emit(QueryCacheEvent::Aborted { key: self.key_string(), timestamp: Instant::now() });
    }

    fn key_string(&self) -> String {
        self.key.clone().into()
    }

    fn emit(&self, event: QueryCacheEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.config.event_listeners.emit(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn leader_stores_then_followers_see_the_value() {
        let cache: QueryCache<String, u32> = QueryCache::new(QueryCacheConfig::builder().build());
        let leader = cache.get_or_create("a".to_string());
        let ctx = Context::generate();

        match leader.fetch_or_lock(&ctx).await {
            FetchOutcome::Leader => leader.store_and_unlock(42, 4),
            _ => panic!("expected to lead"),
        }

        let follower = cache.get_or_create("a".to_string());
        match follower.fetch_or_lock(&ctx).await {
            FetchOutcome::Hit(v) => assert_eq!(*v, 42),
            _ => panic!("expected a cache hit"),
        }
    }

    #[tokio::test]
    async fn concurrent_callers_elect_exactly_one_leader() {
        let cache: QueryCache<String, u32> = QueryCache::new(QueryCacheConfig::builder().build());
        let leaders = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let leaders = Arc::clone(&leaders);
            handles.push(tokio::spawn(async move {
                let handle = cache.get_or_create("k".to_string());
                let ctx = Context::generate().with_deadline(Duration::from_millis(200));
                match handle.fetch_or_lock(&ctx).await {
                    FetchOutcome::Leader => {
                        leaders.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        handle.store_and_unlock(7, 1);
                    }
                    FetchOutcome::Hit(v) => assert_eq!(*v, 7),
                    FetchOutcome::GiveUp => panic!("should not give up within deadline"),
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(leaders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn aborted_leader_lets_a_follower_take_over() {
        let cache: QueryCache<String, u32> = QueryCache::new(QueryCacheConfig::builder().build());
        let ctx = Context::generate();

        let first = cache.get_or_create("a".to_string());
        assert!(matches!(first.fetch_or_lock(&ctx).await, FetchOutcome::Leader));

        let follower_handle = cache.get_or_create("a".to_string());
        let follower_ctx = Context::generate();
        let follower = tokio::spawn(async move { follower_handle.fetch_or_lock(&follower_ctx).await });

        tokio::task::yield_now().await;
        first.store_abort();

        match follower.await.unwrap() {
            FetchOutcome::Leader => {}
            _ => panic!("the follower should inherit leadership after an abort"),
        }
    }

    #[tokio::test]
    async fn follower_gives_up_on_its_own_deadline_without_affecting_the_leader() {
        let cache: QueryCache<String, u32> = QueryCache::new(QueryCacheConfig::builder().build());
        let leader = cache.get_or_create("a".to_string());
        let leader_ctx = Context::generate();
        assert!(matches!(leader.fetch_or_lock(&leader_ctx).await, FetchOutcome::Leader));

        let follower = cache.get_or_create("a".to_string());
        let follower_ctx = Context::generate().with_deadline(Duration::from_millis(15));
        assert!(matches!(follower.fetch_or_lock(&follower_ctx).await, FetchOutcome::GiveUp));

        leader.store_and_unlock(1, 1);
        let late = cache.get_or_create("a".to_string());
        assert!(matches!(late.fetch_or_lock(&Context::generate()).await, FetchOutcome::Hit(_)));
    }

    #[tokio::test]
    async fn stale_entries_expire_and_can_be_refreshed() {
        let cache: QueryCache<String, u32> =
            QueryCache::new(QueryCacheConfig::builder().ttl(Duration::from_millis(20)).build());
        let ctx = Context::generate();

        let leader = cache.get_or_create("a".to_string());
        assert!(matches!(leader.fetch_or_lock(&ctx).await, FetchOutcome::Leader));
        leader.store_and_unlock(1, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        let refreshed = cache.get_or_create("a".to_string());
        assert!(matches!(refreshed.fetch_or_lock(&ctx).await, FetchOutcome::Leader));
    }

    #[tokio::test]
    async fn size_accounting_tracks_stores_and_evictions() {
        let cache: QueryCache<String, u32> =
            QueryCache::new(QueryCacheConfig::builder().max_entries(1).build());
        let ctx = Context::generate();

        let a = cache.get_or_create("a".to_string());
        assert!(matches!(a.fetch_or_lock(&ctx).await, FetchOutcome::Leader));
        a.store_and_unlock(1, 10);
        assert_eq!(cache.size(), 10);

        // Exceeding max_entries evicts the oldest Available entry.
        let b = cache.get_or_create("b".to_string());
        assert!(matches!(b.fetch_or_lock(&ctx).await, FetchOutcome::Leader));
        b.store_and_unlock(2, 5);

        assert_eq!(cache.size(), 5);
        assert_eq!(cache.len(), 1);
    }
}

//! The fan-out/aggregation dispatcher (§4.F): the `BroadcastGroup`.
//!
//! A `BroadcastGroup` owns a fixed set of [`carbon_zipper_backend::Backend`]s,
//! a [`carbon_zipper_pathcache::PathCache`] routing hint, and four
//! single-flight [`carbon_zipper_querycache::QueryCache`]s (one per surface:
//! find, fetch, info, probe). Every public method follows the same shape
//! (§4.F "Fan-out protocol"):
//!
//! 1. derive a deterministic cache key from `(group name, request)`;
//! 2. `fetch_or_lock` — return immediately on a cache hit, otherwise become
//!    the leader for this key;
//! 3. derive a child [`Context`] bounded by the surface's deadline;
//! 4. choose servers, dispatch one task per chosen backend (request
//!    splitting happens here for Fetch, §4.F "Request splitting");
//! 5. gather responses on a channel sized to the dispatch count, merging as
//!    they arrive, until every task finishes or the deadline fires;
//! 6. store the aggregate (or abort the leadership) and return.
//!
//! Grounded on `tower_resilience_bulkhead`'s semaphore-gated dispatch and
//! `tower_resilience_coalesce`'s join/lead/release shape, composed around
//! the domain-specific merge rules in
//! `carbon_zipper_types`.

mod config;
mod events;
mod routing;
mod split;

pub use config::{BroadcastGroupConfig, BroadcastGroupConfigBuilder, Timeouts};
pub use events::BroadcastEvent;
pub use routing::{choose_servers, tld};

use carbon_zipper_backend::Backend;
use carbon_zipper_core::{Context, ErrorBag, ZipperError};
use carbon_zipper_pathcache::PathCache;
use carbon_zipper_querycache::{FetchOutcome, QueryCache, QueryCacheConfig};
use carbon_zipper_types::{
    FetchRequest, Merge, MultiFetchRequest, MultiFetchResponse, MultiGlobResponse,
    ZipperInfoResponse,
};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

#[cfg(feature = "metrics")]
use metrics::counter;

/// The set of TLDs discovered by a probe, with an order-independent union
/// merge so a timed-out probe still reports whatever the fast backends found.
#[derive(Debug, Clone, Default)]
struct TldSet(BTreeSet<String>);

impl Merge for TldSet {
    fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }
}

/// The fan-out/aggregation dispatcher for one group of backends.
pub struct BroadcastGroup {
    backends: Vec<Arc<Backend>>,
    path_cache: Arc<PathCache>,
    find_cache: QueryCache<String, MultiGlobResponse>,
    fetch_cache: QueryCache<String, MultiFetchResponse>,
    info_cache: QueryCache<String, ZipperInfoResponse>,
    probe_cache: QueryCache<String, Vec<String>>,
    config: BroadcastGroupConfig,
}

impl BroadcastGroup {
    /// Creates a group over `backends`, sharing `path_cache` for routing
    /// hints. Fails with [`ZipperError::Fatal`] if `backends` is empty — a
    /// group with nothing to ask can never produce data (§7).
    pub fn new(
        config: BroadcastGroupConfig,
        backends: Vec<Arc<Backend>>,
        path_cache: Arc<PathCache>,
    ) -> Result<Self, ZipperError> {
        if backends.is_empty() {
            return Err(ZipperError::Fatal(format!(
                "broadcast group {:?} constructed with no backends",
                config.name()
            )));
        }
        let cache_config = config.query_cache.clone();
        Ok(Self {
            backends,
            path_cache,
            find_cache: QueryCache::new(cache_config.clone()),
            fetch_cache: QueryCache::new(cache_config.clone()),
            info_cache: QueryCache::new(cache_config.clone()),
            probe_cache: QueryCache::new(cache_config),
            config,
        })
    }

    /// The group's configured name, used as the cache-key prefix.
    pub fn name(&self) -> &str {
        self.config.name()
    }

    /// Every backend in the group, regardless of routing.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    fn choose(&self, names: &[String]) -> Vec<Arc<Backend>> {
        routing::choose_servers(&self.backends, &self.path_cache, names)
    }

    // ---- Fetch -----------------------------------------------------

    /// Fan-out Render/Fetch (§4.F). Splits the request per backend when
    /// that backend declares a per-request metric cap.
    pub async fn fetch(
        &self,
        ctx: &Context,
        request: MultiFetchRequest,
    ) -> Result<(MultiFetchResponse, ErrorBag), ZipperError> {
        let key = carbon_zipper_types::key::fetch_key(self.name(), &request);
        let handle = self.fetch_cache.get_or_create(key);

        match handle.fetch_or_lock(ctx).await {
            FetchOutcome::Hit(value) => return Ok(((*value).clone(), ErrorBag::new())),
            FetchOutcome::GiveUp => return Err(ZipperError::Timeout { unanswered: Vec::new() }),
            FetchOutcome::Leader => {}
        }

        let result = self.fetch_leader(ctx, &request).await;
        match &result {
            Ok((aggregate, _)) => {
                handle.store_and_unlock(aggregate.clone(), aggregate.clone().into_responses().len())
            }
            Err(_) => handle.store_abort(),
        }
        result
    }

    async fn fetch_leader(
        &self,
        ctx: &Context,
        request: &MultiFetchRequest,
    ) -> Result<(MultiFetchResponse, ErrorBag), ZipperError> {
        let child_ctx = ctx.with_deadline(self.config.timeouts.render);
        let names: Vec<String> = request.metrics.iter().map(|m| m.name.clone()).collect();
        let servers = self.choose(&names);
        self.emit_servers_chosen("fetch", servers.len());

        let needs_split = servers.iter().any(|b| b.max_metrics_per_request() > 0);
        let (leaves, mut errors) = if needs_split {
            self.resolve_leaves(&child_ctx, &request.metrics).await
        } else {
            (Vec::new(), ErrorBag::new())
        };

        let (tx, rx) = mpsc::channel::<(String, Result<MultiFetchResponse, ZipperError>)>(
            dispatch_capacity(&servers, &leaves),
        );
        for backend in &servers {
            let cap = backend.max_metrics_per_request();
            if cap == 0 {
                spawn_fetch(Arc::clone(backend), child_ctx.clone(), request.clone(), tx.clone());
            } else {
                for chunk in split::chunk_leaves(leaves.clone(), cap) {
                    let chunked = MultiFetchRequest { metrics: chunk };
                    spawn_fetch(Arc::clone(backend), child_ctx.clone(), chunked, tx.clone());
                }
            }
        }
        drop(tx);

        let chosen: HashSet<String> = servers.iter().map(|b| b.address().to_string()).collect();
        let (aggregate, gather_errors) = gather(&child_ctx, rx, chosen, "fetch", &self.config).await;
        errors.merge(gather_errors);

        if aggregate.is_empty() {
            return Err(ZipperError::NonFatal("no backend produced data".to_string()));
        }
        Ok((aggregate, errors))
    }

    /// Resolves each metric's pattern to concrete leaves via `Find` against
    /// this group (§4.F "Request splitting"), carrying forward the
    /// originating metric's time window and filters.
    async fn resolve_leaves(
        &self,
        ctx: &Context,
        metrics: &[FetchRequest],
    ) -> (Vec<FetchRequest>, ErrorBag) {
        let mut leaves = Vec::new();
        let mut errors = ErrorBag::new();

        for metric in metrics {
            match self.find(ctx, vec![metric.name.clone()]).await {
                Ok((matches, find_errors)) => {
                    errors.merge(find_errors);
                    for m in matches.into_matches() {
                        if m.is_leaf {
                            leaves.push(FetchRequest {
                                name: m.path,
                                start_time: metric.start_time,
                                stop_time: metric.stop_time,
                                path_expression: metric.path_expression.clone(),
                                filter_functions: metric.filter_functions.clone(),
                            });
                        }
                    }
                }
                Err(e) => errors.push(metric.name.clone(), e),
            }
        }
        (leaves, errors)
    }

    // ---- Find --------------------------------------------------------

    /// Fan-out Find (§4.F). `names` is the set of glob patterns requested
    /// together; each is dispatched to every chosen backend independently
    /// since the per-backend HTTP surface takes one query at a time (§6).
    pub async fn find(
        &self,
        ctx: &Context,
        names: Vec<String>,
    ) -> Result<(MultiGlobResponse, ErrorBag), ZipperError> {
        let key = carbon_zipper_types::key::find_key(self.name(), &names);
        let handle = self.find_cache.get_or_create(key);

        match handle.fetch_or_lock(ctx).await {
            FetchOutcome::Hit(value) => return Ok(((*value).clone(), ErrorBag::new())),
            FetchOutcome::GiveUp => return Err(ZipperError::Timeout { unanswered: Vec::new() }),
            FetchOutcome::Leader => {}
        }

        let result = self.find_leader(ctx, &names).await;
        match &result {
            Ok((aggregate, _)) => {
                handle.store_and_unlock(aggregate.clone(), aggregate.clone().into_matches().len())
            }
            Err(_) => handle.store_abort(),
        }
        result
    }

    async fn find_leader(
        &self,
        ctx: &Context,
        names: &[String],
    ) -> Result<(MultiGlobResponse, ErrorBag), ZipperError> {
        let child_ctx = ctx.with_deadline(self.config.timeouts.find);
        let servers = self.choose(names);
        self.emit_servers_chosen("find", servers.len());

        let (tx, rx) = mpsc::channel::<(String, Result<MultiGlobResponse, ZipperError>)>(
            (servers.len() * names.len().max(1)).max(1),
        );
        for backend in &servers {
            for name in names {
                let backend = Arc::clone(backend);
                let ctx2 = child_ctx.clone();
                let query = name.clone();
                let txc = tx.clone();
                tokio::spawn(async move {
                    let result = backend
                        .find(&ctx2, &query)
                        .await
                        .map(MultiGlobResponse::from_matches);
                    let _ = txc.send((backend.address().to_string(), result)).await;
                });
            }
        }
        drop(tx);

        let chosen: HashSet<String> = servers.iter().map(|b| b.address().to_string()).collect();
        let (aggregate, errors) = gather(&child_ctx, rx, chosen, "find", &self.config).await;

        if aggregate.is_empty() {
            return Err(ZipperError::NonFatal("no backend produced data".to_string()));
        }
        Ok((aggregate, errors))
    }

    // ---- Info ----------------------------------------------------------

    /// Fan-out Info (§4.F). Unlike Fetch, Info request splitting is not
    /// implemented (§9 open question, resolved: parity with the reference
    /// source, not required).
    pub async fn info(
        &self,
        ctx: &Context,
        targets: Vec<String>,
    ) -> Result<(ZipperInfoResponse, ErrorBag), ZipperError> {
        let key = carbon_zipper_types::key::info_key(self.name(), &targets);
        let handle = self.info_cache.get_or_create(key);

        match handle.fetch_or_lock(ctx).await {
            FetchOutcome::Hit(value) => return Ok(((*value).clone(), ErrorBag::new())),
            FetchOutcome::GiveUp => return Err(ZipperError::Timeout { unanswered: Vec::new() }),
            FetchOutcome::Leader => {}
        }

        let result = self.info_leader(ctx, &targets).await;
        match &result {
            Ok((aggregate, _)) => handle.store_and_unlock(aggregate.clone(), aggregate.info.len()),
            Err(_) => handle.store_abort(),
        }
        result
    }

    async fn info_leader(
        &self,
        ctx: &Context,
        targets: &[String],
    ) -> Result<(ZipperInfoResponse, ErrorBag), ZipperError> {
        let child_ctx = ctx.with_deadline(self.config.timeouts.find);
        let servers = self.choose(targets);
        self.emit_servers_chosen("info", servers.len());

        let (tx, rx) =
            mpsc::channel::<(String, Result<ZipperInfoResponse, ZipperError>)>(servers.len().max(1));
        for backend in &servers {
            let backend = Arc::clone(backend);
            let ctx2 = child_ctx.clone();
            let targets = targets.to_vec();
            let txc = tx.clone();
            tokio::spawn(async move {
                let result = backend.info(&ctx2, &targets).await;
                let _ = txc.send((backend.address().to_string(), result)).await;
            });
        }
        drop(tx);

        let chosen: HashSet<String> = servers.iter().map(|b| b.address().to_string()).collect();
        let (aggregate, errors) = gather(&child_ctx, rx, chosen, "info", &self.config).await;

        if aggregate.is_empty() {
            return Err(ZipperError::NonFatal("no backend produced data".to_string()));
        }
        Ok((aggregate, errors))
    }

    // ---- Probe / TLD discovery -----------------------------------------

    /// Calls every backend's `Find("*")` concurrently under the Find
    /// deadline, recording `tld -> backend` into the path cache and caching
    /// the union of discovered TLDs (§4.F "Probe / TLD discovery").
    pub async fn probe_tlds(&self, ctx: &Context) -> Result<(Vec<String>, ErrorBag), ZipperError> {
        let key = carbon_zipper_types::key::probe_key().to_string();
        let handle = self.probe_cache.get_or_create(key);

        match handle.fetch_or_lock(ctx).await {
            FetchOutcome::Hit(value) => return Ok(((*value).clone(), ErrorBag::new())),
            FetchOutcome::GiveUp => return Err(ZipperError::Timeout { unanswered: Vec::new() }),
            FetchOutcome::Leader => {}
        }

        let result = self.probe_leader(ctx).await;
        match &result {
            Ok((tlds, _)) => handle.store_and_unlock(tlds.clone(), tlds.len()),
            Err(_) => handle.store_abort(),
        }
        result
    }

    async fn probe_leader(&self, ctx: &Context) -> Result<(Vec<String>, ErrorBag), ZipperError> {
        let child_ctx = ctx.with_deadline(self.config.timeouts.find);

        let (tx, rx) = mpsc::channel::<(String, Result<TldSet, ZipperError>)>(self.backends.len().max(1));
        for backend in &self.backends {
            let backend = Arc::clone(backend);
            let ctx2 = child_ctx.clone();
            let path_cache = Arc::clone(&self.path_cache);
            let txc = tx.clone();
            tokio::spawn(async move {
                let result = backend.find(&ctx2, "*").await.map(|matches| {
                    let mut tlds = BTreeSet::new();
                    for m in matches {
                        if m.is_leaf {
                            let prefix = routing::tld(&m.path).to_string();
                            path_cache.append(prefix.clone(), backend.address().to_string());
                            tlds.insert(prefix);
                        }
                    }
                    TldSet(tlds)
                });
                let _ = txc.send((backend.address().to_string(), result)).await;
            });
        }
        drop(tx);

        let chosen: HashSet<String> = self.backends.iter().map(|b| b.address().to_string()).collect();
        let (aggregate, errors) = gather(&child_ctx, rx, chosen, "probe", &self.config).await;

        if aggregate.0.is_empty() {
            return Err(ZipperError::NonFatal("no backend produced any TLDs".to_string()));
        }
        Ok((aggregate.0.into_iter().collect(), errors))
    }

    fn emit_servers_chosen(&self, surface: &'static str, chosen: usize) {
        self.config.event_listeners.emit(&BroadcastEvent::ServersChosen {
            surface,
            timestamp: Instant::now(),
            chosen,
            total: self.backends.len(),
        });
        #[cfg(feature = "metrics")]
        counter!("zipper_broadcast_servers_chosen", "surface" => surface).increment(chosen as u64);
    }
}

fn spawn_fetch(
    backend: Arc<Backend>,
    ctx: Context,
    request: MultiFetchRequest,
    tx: mpsc::Sender<(String, Result<MultiFetchResponse, ZipperError>)>,
) {
    tokio::spawn(async move {
        let result = backend.render(&ctx, &request).await;
        let _ = tx.send((backend.address().to_string(), result)).await;
    });
}

fn dispatch_capacity(servers: &[Arc<Backend>], leaves: &[FetchRequest]) -> usize {
    let mut total = 0usize;
    for backend in servers {
        let cap = backend.max_metrics_per_request();
        total += if cap == 0 {
            1
        } else {
            split::chunk_leaves(leaves.to_vec(), cap).len().max(1)
        };
    }
    total.max(1)
}

/// Drives the gather loop shared by every fan-out surface (§4.F step 5):
/// merges responses as they arrive on `rx`, tracking which of `chosen`
/// backends answered, until either every dispatched task finishes (the
/// channel drains and closes) or `ctx`'s deadline fires. A deadline firing
/// still returns whatever merged so far, plus a `Timeout` error naming the
/// backends that never answered (§5, §8 "Timeout partial-result").
async fn gather<T>(
    ctx: &Context,
    mut rx: mpsc::Receiver<(String, Result<T, ZipperError>)>,
    chosen: HashSet<String>,
    surface: &'static str,
    config: &BroadcastGroupConfig,
) -> (T, ErrorBag)
where
    T: Merge + Default,
{
    let mut aggregate = T::default();
    let mut errors = ErrorBag::new();
    let mut answered: HashSet<String> = HashSet::new();
    let mut timed_out = false;

    loop {
        tokio::select! {
            biased;
            received = rx.recv() => {
                match received {
                    Some((backend, result)) => {
                        answered.insert(backend.clone());
                        match result {
                            Ok(value) => aggregate.merge(value),
                            Err(e) => errors.push(backend, e),
                        }
                    }
                    None => break,
                }
            }
            _ = ctx.done() => {
                // Tasks still in flight hold a clone of this same deadline's
                // token (via `with_deadline`'s child context); cancelling it
                // here aborts their backend calls instead of leaving them to
                // run past the surface deadline (§5, §9).
                ctx.cancel();
                timed_out = true;
                break;
            }
        }
    }

    if timed_out {
        let unanswered: Vec<String> = chosen.difference(&answered).cloned().collect();
        if !unanswered.is_empty() {
            config.event_listeners.emit(&BroadcastEvent::TimedOut {
                surface,
                timestamp: Instant::now(),
                unanswered: unanswered.clone(),
            });
            errors.push(config.name().to_string(), ZipperError::Timeout { unanswered });
        }
    }

    config.event_listeners.emit(&BroadcastEvent::Completed {
        surface,
        timestamp: Instant::now(),
        answered: answered.len(),
        failed: errors.errors().len(),
    });

    (aggregate, errors)
}

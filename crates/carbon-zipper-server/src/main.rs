//! Axum server wiring a [`BroadcastGroup`] to the Graphite-compatible HTTP
//! surface described in §6: `/metrics/find`, `/render`, `/info`,
//! `/lb_check`. Metrics are exposed on a separate internal listener so the
//! public surface never serves Prometheus scrapes (a split between an
//! application port and an admin port).

mod config;
mod handlers;
mod render;

use axum::routing::get;
use axum::Router;
use carbon_zipper_backend::{Backend, BackendConfig};
use carbon_zipper_broadcast::{BroadcastGroup, BroadcastGroupConfig};
use carbon_zipper_limiter::{Limiter, LimiterConfig};
use carbon_zipper_pathcache::{PathCache, PathCacheConfig};
use clap::Parser;
use config::{Cli, ZipperConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone)]
struct AppState {
    group: Arc<BroadcastGroup>,
}

fn build_http_client(config: &ZipperConfig) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .pool_max_idle_per_host(config.max_idle_connections_per_host)
        .tcp_keepalive(config.keep_alive_interval)
        .connect_timeout(config.connect_timeout)
        .timeout(config.overall_timeout)
        .build()?)
}

fn build_group(config: &ZipperConfig) -> anyhow::Result<Arc<BroadcastGroup>> {
    let http = build_http_client(config)?;

    let capacities: Vec<(String, usize)> = if config.concurrency_limit_per_server > 0 {
        config.backends.iter().map(|b| (b.address.clone(), config.concurrency_limit_per_server)).collect()
    } else {
        Vec::new()
    };
    let limiter = Arc::new(Limiter::new(LimiterConfig::builder().capacities(capacities).build()));

    let backends: Vec<Arc<Backend>> = config
        .backends
        .iter()
        .map(|spec| {
            let backend_config = BackendConfig::builder(spec.address.clone())
                .timeout(config.overall_timeout)
                .max_metrics_per_request(spec.max_metrics_per_request)
                .build();
            Arc::new(Backend::new(backend_config, http.clone(), Arc::clone(&limiter)))
        })
        .collect();

    let path_cache = Arc::new(PathCache::new(PathCacheConfig::builder().ttl(config.path_cache_expiry).build()));

    let group_config = BroadcastGroupConfig::builder("zipper")
        .find_timeout(config.find_timeout)
        .render_timeout(config.render_timeout)
        .on_event(carbon_zipper_core::FnListener::new(|event: &carbon_zipper_broadcast::BroadcastEvent| {
            tracing::debug!(?event, "broadcast event");
        }))
        .build();

    Ok(Arc::new(BroadcastGroup::new(group_config, backends, path_cache)?))
}

/// Exponential latency buckets from 1ms to roughly 10s, `histogram_buckets`
/// wide — a coarser count trades resolution for exporter payload size.
fn latency_buckets(histogram_buckets: usize) -> Vec<f64> {
    let count = histogram_buckets.max(1);
    let growth = 10_000f64.powf(1.0 / count as f64);
    (0..count).map(|i| 0.001 * growth.powi(i as i32 + 1)).collect()
}

fn install_metrics_exporter(addr: std::net::SocketAddr, histogram_buckets: usize) -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(&latency_buckets(histogram_buckets))?
        .install()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = ZipperConfig::load(&cli.config)?;

    if let Err(e) = install_metrics_exporter(config.internal_listen, config.histogram_buckets) {
        tracing::warn!(error = %e, "metrics exporter failed to install; continuing without it");
    }

    let group = build_group(&config)?;
    tracing::info!(backends = group.backends().len(), "broadcast group constructed");

    let app = Router::new()
        .route("/metrics/find", get(handlers::find))
        .route("/render", get(handlers::render_handler))
        .route("/info", get(handlers::info))
        .route("/lb_check", get(handlers::lb_check))
        .with_state(AppState { group: Arc::clone(&group) });

    let listener = TcpListener::bind(config.listen).await?;
    tracing::info!(addr = %config.listen, "listening");

    tokio::spawn(probe_loop(Arc::clone(&group)));

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically warms the TLD routing cache so the first real request after
/// startup doesn't pay the discovery cost (§4.F "Probe / TLD discovery").
async fn probe_loop(group: Arc<BroadcastGroup>) {
    let mut interval = tokio::time::interval(Duration::from_secs(300));
    loop {
        interval.tick().await;
        let ctx = carbon_zipper_core::Context::generate();
        if let Err(e) = group.probe_tlds(&ctx).await {
            tracing::warn!(error = %e, "periodic TLD probe failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_buckets_are_increasing_and_sized_as_requested() {
        let buckets = latency_buckets(10);
        assert_eq!(buckets.len(), 10);
        assert!(buckets.windows(2).all(|w| w[0] < w[1]));
        assert!(buckets.first().unwrap() > &0.0);
    }

    #[test]
    fn zero_buckets_falls_back_to_one() {
        assert_eq!(latency_buckets(0).len(), 1);
    }
}

//! `ZipperConfig`: the semantic configuration surface, loaded from a TOML
//! file whose path is given on the command line.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// CLI entry point: `carbon-zipper-server --config path/to/zipper.toml`.
#[derive(clap::Parser, Debug)]
#[command(name = "carbon-zipper-server", about = "Fan-out query aggregator for Graphite-compatible backends")]
pub struct Cli {
    /// Path to a TOML configuration file (see [`ZipperConfig`]).
    #[arg(long, short = 'c')]
    pub config: PathBuf,
}

/// One backend entry in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSpec {
    /// Base URL, e.g. `http://10.0.0.1:8080`.
    pub address: String,
    /// Per-request metric cap; `0` or absent means unlimited.
    #[serde(default)]
    pub max_metrics_per_request: usize,
}

/// The full configuration surface listed in §6.
#[derive(Debug, Clone, Deserialize)]
pub struct ZipperConfig {
    /// Address the public HTTP surface listens on.
    pub listen: SocketAddr,
    /// Address the internal metrics surface listens on.
    pub internal_listen: SocketAddr,
    /// The fleet of backends this process fans out to.
    pub backends: Vec<BackendSpec>,
    /// `reqwest` max idle connections per host.
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_connections_per_host: usize,
    /// TCP keep-alive probe interval.
    #[serde(with = "humantime_serde", default = "default_keep_alive")]
    pub keep_alive_interval: Duration,
    /// TCP connect timeout.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Overall per-call timeout applied to every backend request.
    #[serde(with = "humantime_serde", default = "default_overall_timeout")]
    pub overall_timeout: Duration,
    /// Deadline applied to Find/Info/Probe fan-outs.
    #[serde(with = "humantime_serde", default = "default_find_timeout")]
    pub find_timeout: Duration,
    /// Deadline applied to Fetch fan-outs.
    #[serde(with = "humantime_serde", default = "default_render_timeout")]
    pub render_timeout: Duration,
    /// Per-backend concurrency ceiling; `0` means unbounded.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit_per_server: usize,
    /// TTL for the TLD routing cache.
    #[serde(with = "humantime_serde", default = "default_path_cache_expiry")]
    pub path_cache_expiry: Duration,
    /// Histogram bucket count for latency metrics.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: usize,
}

fn default_max_idle_per_host() -> usize {
    100
}
fn default_keep_alive() -> Duration {
    Duration::from_secs(30)
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(1)
}
fn default_overall_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_find_timeout() -> Duration {
    Duration::from_secs(1)
}
fn default_render_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_concurrency_limit() -> usize {
    100
}
fn default_path_cache_expiry() -> Duration {
    Duration::from_secs(600)
}
fn default_histogram_buckets() -> usize {
    60
}

impl ZipperConfig {
    /// Loads and parses a configuration file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        let config: ZipperConfig = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;
        Ok(config)
    }
}

/// Minimal `humantime`-compatible (de)serializer module so config files can
/// write durations as `"10s"`/`"500ms"` without pulling in the `humantime`
/// crate, which the workspace does not otherwise depend on.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{}ms", d.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    fn parse(raw: &str) -> Result<Duration, String> {
        let raw = raw.trim();
        let (digits, suffix) = raw
            .find(|c: char| !c.is_ascii_digit())
            .map(|i| raw.split_at(i))
            .ok_or_else(|| format!("duration {raw:?} has no unit"))?;
        let value: u64 = digits.parse().map_err(|_| format!("invalid duration {raw:?}"))?;
        match suffix {
            "ms" => Ok(Duration::from_millis(value)),
            "s" => Ok(Duration::from_secs(value)),
            "m" => Ok(Duration::from_secs(value * 60)),
            other => Err(format!("unsupported duration unit {other:?} in {raw:?}")),
        }
    }

}

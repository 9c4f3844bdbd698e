//! A fan-out query aggregator for a fleet of Graphite-compatible
//! time-series backends.
//!
//! `carbon-zipper` sits in front of many storage backends and serves a
//! single Graphite-compatible query surface: metric discovery (`Find`),
//! metadata lookup (`Info`), and raw-sample retrieval (`Fetch`/`Render`).
//! A client request is translated into a parallel request to every relevant
//! backend, partial responses are merged, and one consolidated answer is
//! returned under a deadline.
//!
//! Each concern lives in its own crate and is available here behind a
//! feature flag, in the manner of the `tower-resilience` meta-crate this
//! workspace is built on:
//!
//! | Feature | Crate | Provides |
//! |---|---|---|
//! | `core` | [`carbon_zipper_core`] | `Context` (deadline + request-id), `Trace`, `ZipperError`/`ErrorBag` |
//! | `limiter` | [`carbon_zipper_limiter`] | Per-backend concurrency limiter |
//! | `pathcache` | [`carbon_zipper_pathcache`] | TLD routing cache |
//! | `querycache` | [`carbon_zipper_querycache`] | Single-flight query cache |
//! | `types` | [`carbon_zipper_types`] | Data model, merge helpers, protobuf wire codec |
//! | `backend` | [`carbon_zipper_backend`] | HTTP client to one remote store |
//! | `broadcast` | [`carbon_zipper_broadcast`] | `BroadcastGroup`, the fan-out dispatcher |
//!
//! `full` (the default) enables every feature.
//!
//! # Quick start
//!
//! ```toml
//! [dependencies]
//! carbon-zipper = { version = "0.1", features = ["broadcast"] }
//! ```
//!
//! ```no_run
//! use carbon_zipper::broadcast::{BroadcastGroup, BroadcastGroupConfig};
//! use carbon_zipper::backend::{Backend, BackendConfig};
//! use carbon_zipper::limiter::{Limiter, LimiterConfig};
//! use carbon_zipper::pathcache::{PathCache, PathCacheConfig};
//! use carbon_zipper::core::Context;
//! use carbon_zipper::types::{FetchRequest, MultiFetchRequest};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(Limiter::new(LimiterConfig::builder().capacity("b1", 32).build()));
//! let backend = Arc::new(Backend::new(
//!     BackendConfig::builder("http://10.0.0.1:8080").build(),
//!     reqwest::Client::new(),
//!     limiter,
//! ));
//! let group = BroadcastGroup::new(
//!     BroadcastGroupConfig::builder("cluster-a").build(),
//!     vec![backend],
//!     Arc::new(PathCache::new(PathCacheConfig::builder().build())),
//! )?;
//!
//! let request = MultiFetchRequest {
//!     metrics: vec![FetchRequest {
//!         name: "servers.web01.cpu".to_string(),
//!         start_time: 0,
//!         stop_time: 600,
//!         path_expression: "servers.web01.cpu".to_string(),
//!         filter_functions: vec![],
//!     }],
//! };
//! let (response, errors) = group.fetch(&Context::generate(), request).await?;
//! assert!(errors.is_empty() || !response.is_empty());
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "core")]
pub use carbon_zipper_core as core;

#[cfg(feature = "limiter")]
pub use carbon_zipper_limiter as limiter;

#[cfg(feature = "pathcache")]
pub use carbon_zipper_pathcache as pathcache;

#[cfg(feature = "querycache")]
pub use carbon_zipper_querycache as querycache;

#[cfg(feature = "types")]
pub use carbon_zipper_types as types;

#[cfg(feature = "backend")]
pub use carbon_zipper_backend as backend;

#[cfg(feature = "broadcast")]
pub use carbon_zipper_broadcast as broadcast;

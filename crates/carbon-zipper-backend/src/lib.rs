//! HTTP client to one remote time-series backend (§4.E).
//!
//! A `Backend` wraps a single `reqwest::Client`, a shared [`Limiter`] slot
//! for its name, and a [`LearnedPaths`] hint cache. It speaks the protobuf
//! wire format described in §6 and never retries; retry/backoff policy, if
//! any, belongs to the caller.
//!
//! Grounded on the `doublewordai` control-layer's `ProbeExecutor`: one
//! `reqwest::Client` per remote, an async method per call shape, status
//! classified into a small error enum rather than bubbling `reqwest`
//! errors directly.

mod config;
mod decode;
mod learned_paths;

pub use config::{BackendConfig, BackendConfigBuilder};
pub use learned_paths::LearnedPaths;

use carbon_zipper_core::{Context, HttpErrorClass, ZipperError};
use carbon_zipper_limiter::Limiter;
use carbon_zipper_types::{Match, MultiFetchRequest, MultiFetchResponse, ZipperInfoResponse};
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PROBE_DEADLINE: Duration = Duration::from_secs(5);

/// An HTTP client bound to one remote store.
pub struct Backend {
    http: reqwest::Client,
    config: BackendConfig,
    limiter: Arc<Limiter>,
    learned_paths: LearnedPaths,
}

impl Backend {
    pub fn new(config: BackendConfig, http: reqwest::Client, limiter: Arc<Limiter>) -> Self {
        let learned_paths = LearnedPaths::new(config.learned_paths_ttl);
        Self { http, config, limiter, learned_paths }
    }

    pub fn address(&self) -> &str {
        self.config.address()
    }

    /// The backend's declared per-request metric cap; `0` means unlimited
    /// (§4.F "Request splitting").
    pub fn max_metrics_per_request(&self) -> usize {
        self.config.max_metrics_per_request
    }

    fn scoped_context(&self, ctx: &Context) -> Context {
        match self.config.timeout {
            Some(timeout) => ctx.with_deadline(timeout),
            None => ctx.clone(),
        }
    }

    async fn acquire(&self, ctx: &Context) -> Result<carbon_zipper_limiter::LimiterGuard, ZipperError> {
        self.limiter.enter(ctx, self.address()).await.map_err(|_| ZipperError::Timeout {
            unanswered: vec![self.address().to_string()],
        })
    }

    fn status_error(status: reqwest::StatusCode) -> ZipperError {
        ZipperError::Http { status: status.as_u16(), class: HttpErrorClass::from_status(status.as_u16()) }
    }

    fn content_type(response: &reqwest::Response) -> String {
        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    }

    /// Races the HTTP send against `ctx`'s deadline/cancellation so a fired
    /// Find/Render deadline aborts the in-flight call promptly instead of
    /// running until the client-wide `reqwest` timeout (§5, §9). A transport
    /// failure (connection refused, DNS, reset) is this backend's own
    /// problem, not an invariant violation — it is `NonFatal` so the
    /// aggregate can still succeed from the backends that did answer (§7).
    async fn send_request(
        &self,
        ctx: &Context,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ZipperError> {
        tokio::select! {
            biased;
            result = builder.send() => result.map_err(|e| ZipperError::NonFatal(e.to_string())),
            _ = ctx.done() => Err(ZipperError::Timeout { unanswered: vec![self.address().to_string()] }),
        }
    }

    /// Same cancellation race for the body read (§5 "every blocking call
    /// takes a Context").
    async fn read_body(&self, ctx: &Context, response: reqwest::Response) -> Result<Vec<u8>, ZipperError> {
        tokio::select! {
            biased;
            result = response.bytes() => result.map(|b| b.to_vec()).map_err(|e| ZipperError::NonFatal(e.to_string())),
            _ = ctx.done() => Err(ZipperError::Timeout { unanswered: vec![self.address().to_string()] }),
        }
    }

    /// `POST {address}/metrics/find?query=<query>&format=protobuf`. An
    /// empty result is a [`ZipperError::NotFound`]; leaf matches are
    /// recorded into [`LearnedPaths`].
    pub async fn find(&self, ctx: &Context, query: &str) -> Result<Vec<Match>, ZipperError> {
        let ctx = self.scoped_context(ctx);
        let _permit = self.acquire(&ctx).await?;

        let url = format!("{}/metrics/find", self.config.address());
        let builder = self
            .http
            .post(&url)
            .query(&[("query", query), ("format", "protobuf")])
            .header("X-Request-Id", ctx.request_id().to_string());
        let start = Instant::now();
        let response = self.send_request(&ctx, builder).await?;
        ctx.add_phase("http_round_trip", start);

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status));
        }
        let content_type = Self::content_type(&response);

        let body_start = Instant::now();
        let body = self.read_body(&ctx, response).await?;
        ctx.add_phase("body_read", body_start);

        let matches = decode::decode_find(&content_type, &body)?;
        if matches.is_empty() {
            return Err(ZipperError::NotFound);
        }
        for m in &matches {
            if m.is_leaf {
                self.learned_paths.record(m.path.clone());
            }
        }
        Ok(matches)
    }

    /// `POST {address}/render?target=…&from=…&until=…&format=protobuf`.
    pub async fn render(
        &self,
        ctx: &Context,
        request: &MultiFetchRequest,
    ) -> Result<MultiFetchResponse, ZipperError> {
        let ctx = self.scoped_context(ctx);
        let _permit = self.acquire(&ctx).await?;

        let from = request.metrics.iter().map(|m| m.start_time).min().unwrap_or(0).to_string();
        let until = request.metrics.iter().map(|m| m.stop_time).max().unwrap_or(0).to_string();

        let mut query: Vec<(&str, &str)> = vec![("format", "protobuf"), ("from", &from), ("until", &until)];
        for metric in &request.metrics {
            query.push(("target", &metric.name));
        }

        let url = format!("{}/render", self.config.address());
        let builder = self
            .http
            .post(&url)
            .query(&query)
            .header("X-Request-Id", ctx.request_id().to_string());
        let start = Instant::now();
        let response = self.send_request(&ctx, builder).await?;
        ctx.add_phase("http_round_trip", start);

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status));
        }
        let content_type = Self::content_type(&response);

        let body_start = Instant::now();
        let body = self.read_body(&ctx, response).await?;
        ctx.add_phase("body_read", body_start);

        let decoded = decode::decode_render(&content_type, &body)?;
        if decoded.is_empty() {
            return Err(ZipperError::NotFound);
        }
        for name in decode::leaf_names(&decoded.clone().into_responses()) {
            self.learned_paths.record(name.to_string());
        }
        Ok(decoded)
    }

    /// `POST {address}/info?target=…&format=protobuf`.
    pub async fn info(&self, ctx: &Context, targets: &[String]) -> Result<ZipperInfoResponse, ZipperError> {
        let ctx = self.scoped_context(ctx);
        let _permit = self.acquire(&ctx).await?;

        let mut query: Vec<(&str, &str)> = vec![("format", "protobuf")];
        for target in targets {
            query.push(("target", target));
        }

        let url = format!("{}/info", self.config.address());
        let builder = self
            .http
            .post(&url)
            .query(&query)
            .header("X-Request-Id", ctx.request_id().to_string());
        let start = Instant::now();
        let response = self.send_request(&ctx, builder).await?;
        ctx.add_phase("http_round_trip", start);

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status));
        }
        let content_type = Self::content_type(&response);

        let body_start = Instant::now();
        let body = self.read_body(&ctx, response).await?;
        ctx.add_phase("body_read", body_start);

        let decoded = decode::decode_info(&content_type, &body, self.address())?;
        if decoded.is_empty() {
            return Err(ZipperError::NotFound);
        }
        Ok(decoded)
    }

    /// `Find("*")` under a fixed 5-second deadline, warming
    /// [`LearnedPaths`]. Used by the TLD prober (§4.F "Probe / TLD
    /// discovery").
    pub async fn probe(&self) -> Result<Vec<Match>, ZipperError> {
        let ctx = Context::generate().with_deadline(PROBE_DEADLINE);
        match self.find(&ctx, "*").await {
            Ok(matches) => Ok(matches),
            Err(ZipperError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// `true` iff any of `targets` has been observed as a leaf by this
    /// backend. A hint only.
    pub fn contains(&self, targets: &[String]) -> bool {
        targets.iter().any(|t| self.learned_paths.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;
    use carbon_zipper_limiter::LimiterConfig;
    use carbon_zipper_types::wire;
    use prost::Message;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn spawn_fake_backend() -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let app = Router::new()
            .route(
                "/metrics/find",
                post(|| async {
                    let body = wire::MultiGlobResponse {
                        metrics: vec![wire::GlobResponse {
                            name: "*".to_string(),
                            matches: vec![wire::GlobMatch { path: "a.b".to_string(), is_leaf: true }],
                        }],
                    };
                    body.encode_to_vec()
                }),
            )
            .fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "") });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn find_decodes_protobuf_and_records_learned_paths() {
        let (addr, _server) = spawn_fake_backend().await;
        let backend = Backend::new(
            BackendConfig::builder(format!("http://{addr}")).build(),
            reqwest::Client::new(),
            Arc::new(Limiter::new(LimiterConfig::builder().build())),
        );

        let ctx = Context::generate();
        let matches = backend.find(&ctx, "a.*").await.unwrap();
        assert_eq!(matches, vec![Match { path: "a.b".to_string(), is_leaf: true }]);
        assert!(backend.contains(&["a.b".to_string()]));
    }

    #[tokio::test]
    async fn empty_find_result_is_not_found() {
        let app = Router::new().route(
            "/metrics/find",
            post(|| async { wire::MultiGlobResponse::default().encode_to_vec() }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let backend = Backend::new(
            BackendConfig::builder(format!("http://{addr}")).build(),
            reqwest::Client::new(),
            Arc::new(Limiter::new(LimiterConfig::builder().build())),
        );
        let err = backend.find(&Context::generate(), "nothing.*").await.unwrap_err();
        assert!(matches!(err, ZipperError::NotFound));
    }
}

//! HTTP handlers for the public Graphite-compatible surface (§6).
//!
//! Each handler follows the same shape: build a fresh [`Context`], fan the
//! request out through the shared [`BroadcastGroup`], and render whatever
//! came back. Parsing here is deliberately shallow — multiple `target`/
//! `query` values are accepted as a comma-separated list rather than
//! repeated query parameters, since this surface exists to demonstrate the
//! fan-out contract, not to reimplement Graphite's function-expression
//! language.

use crate::render;
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json};
use carbon_zipper_core::{Context, ErrorBag, ZipperError};
use carbon_zipper_types::{FetchRequest, MultiFetchRequest};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::time::Instant;

const DEFAULT_LOOKBACK_SECS: i64 = 24 * 60 * 60;

fn record_request(surface: &'static str, status: StatusCode, start: Instant) {
    histogram!("zipper_http_request_duration_seconds", "surface" => surface).record(start.elapsed().as_secs_f64());
    counter!("zipper_http_requests_total", "surface" => surface, "status" => status.as_u16().to_string())
        .increment(1);
}

fn csv_param(params: &HashMap<String, String>, key: &str) -> Vec<String> {
    params
        .get(key)
        .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn status_for_error(err: &ZipperError) -> StatusCode {
    match err {
        ZipperError::NonFatal(_) | ZipperError::NotFound => StatusCode::OK,
        ZipperError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ZipperError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ZipperError::Http { .. } | ZipperError::Decode(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Carries the request id forward and surfaces the §7 diagnostic (which
/// backends timed out, if any) via response headers rather than folding
/// them into the body — callers that only care about data can ignore both.
fn response_headers(ctx: &Context, errors: &ErrorBag) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
        headers.insert("X-Request-Id", value);
    }
    let timed_out = errors.timed_out_servers();
    if !timed_out.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&timed_out.join(",")) {
            headers.insert("X-Zipper-Timed-Out", value);
        }
    }
    headers
}

pub async fn find(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let start = Instant::now();
    let ctx = Context::generate();
    let queries = csv_param(&params, "query");
    if queries.is_empty() {
        record_request("find", StatusCode::BAD_REQUEST, start);
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "missing query" })))
            .into_response();
    }
    let format = params.get("format").map(String::as_str).unwrap_or("json");

    let (status, response) = match state.group.find(&ctx, queries).await {
        Ok((response, errors)) => {
            let matches = response.into_matches();
            let body = if format == "completer" { render::find_completer(&matches) } else { render::find_json(&matches) };
            (StatusCode::OK, (StatusCode::OK, response_headers(&ctx, &errors), Json(body)).into_response())
        }
        Err(ZipperError::NonFatal(_)) => {
            (StatusCode::OK, (StatusCode::OK, Json(serde_json::Value::Array(vec![]))).into_response())
        }
        Err(e) => {
            let status = status_for_error(&e);
            (status, (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response())
        }
    };
    record_request("find", status, start);
    response
}

#[derive(Debug)]
struct RenderParams {
    targets: Vec<String>,
    from: i64,
    until: i64,
}

fn parse_render_params(params: &HashMap<String, String>) -> RenderParams {
    let now = params.get("now").and_then(|v| v.parse().ok()).unwrap_or(0);
    let until = params.get("until").and_then(|v| v.parse().ok()).unwrap_or(now);
    let from = params.get("from").and_then(|v| v.parse().ok()).unwrap_or(until - DEFAULT_LOOKBACK_SECS);
    RenderParams { targets: csv_param(params, "target"), from, until }
}

pub async fn render_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let start = Instant::now();
    let ctx = Context::generate();
    let parsed = parse_render_params(&params);
    if parsed.targets.is_empty() {
        record_request("render", StatusCode::BAD_REQUEST, start);
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "missing target" })))
            .into_response();
    }

    let request = MultiFetchRequest {
        metrics: parsed
            .targets
            .iter()
            .map(|target| FetchRequest {
                name: target.clone(),
                start_time: parsed.from,
                stop_time: parsed.until,
                path_expression: target.clone(),
                filter_functions: Vec::new(),
            })
            .collect(),
    };

    let (status, response) = match state.group.fetch(&ctx, request).await {
        Ok((response, errors)) => {
            let body = render::render_json(&response.into_responses());
            (StatusCode::OK, (StatusCode::OK, response_headers(&ctx, &errors), Json(body)).into_response())
        }
        Err(ZipperError::NonFatal(_)) => {
            (StatusCode::OK, (StatusCode::OK, Json(serde_json::Value::Array(vec![]))).into_response())
        }
        Err(e) => {
            let status = status_for_error(&e);
            (status, (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response())
        }
    };
    record_request("render", status, start);
    response
}

pub async fn info(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let start = Instant::now();
    let ctx = Context::generate();
    let targets = csv_param(&params, "target");
    if targets.is_empty() {
        record_request("info", StatusCode::BAD_REQUEST, start);
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "missing target" })))
            .into_response();
    }

    let (status, response) = match state.group.info(&ctx, targets).await {
        Ok((response, errors)) => {
            let body = render::info_json_map(&response.info);
            (StatusCode::OK, (StatusCode::OK, response_headers(&ctx, &errors), Json(body)).into_response())
        }
        Err(ZipperError::NonFatal(_)) => {
            (StatusCode::OK, (StatusCode::OK, Json(serde_json::Value::Object(Default::default()))).into_response())
        }
        Err(e) => {
            let status = status_for_error(&e);
            (status, (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response())
        }
    };
    record_request("info", status, start);
    response
}

/// Graphite's load-balancer health check: plain `200 Ok` with no body
/// processing, so an LB can treat a non-200 as "take this node out".
pub async fn lb_check() -> impl IntoResponse {
    (StatusCode::OK, "Ok\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_param_trims_and_drops_empties() {
        let mut params = HashMap::new();
        params.insert("target".to_string(), " a.b , , c.d".to_string());
        assert_eq!(csv_param(&params, "target"), vec!["a.b".to_string(), "c.d".to_string()]);
    }

    #[test]
    fn render_params_default_from_is_relative_to_until() {
        let mut params = HashMap::new();
        params.insert("until".to_string(), "1000".to_string());
        let parsed = parse_render_params(&params);
        assert_eq!(parsed.until, 1000);
        assert_eq!(parsed.from, 1000 - DEFAULT_LOOKBACK_SECS);
    }
}

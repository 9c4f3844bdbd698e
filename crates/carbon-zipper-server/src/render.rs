//! Renders merged zipper responses into the two output formats this
//! surface speaks: `json` (the default, and the only one with full
//! fidelity) and `completer` (the abbreviated shape Graphite's UI
//! autocomplete widget expects from `/metrics/find`).
//!
//! This does not implement the Graphite function-expression language —
//! only enough rendering to carry a merged response back to an HTTP
//! caller (§6).

use carbon_zipper_types::{FetchResponse, InfoResponse, Match, Retention};
use serde_json::{json, Value};

pub fn find_json(matches: &[Match]) -> Value {
    Value::Array(
        matches
            .iter()
            .map(|m| json!({ "path": m.path, "is_leaf": m.is_leaf }))
            .collect(),
    )
}

/// The `completer` format Graphite's UI autocomplete widget consumes:
/// `name` is the last path segment, `is_leaf` is stringified ("1"/"0").
pub fn find_completer(matches: &[Match]) -> Value {
    let metrics: Vec<Value> = matches
        .iter()
        .map(|m| {
            let name = m.path.rsplit('.').next().unwrap_or(&m.path);
            json!({
                "path": m.path,
                "name": name,
                "is_leaf": if m.is_leaf { "1" } else { "0" },
            })
        })
        .collect();
    json!({ "metrics": metrics })
}

pub fn render_json(series: &[FetchResponse]) -> Value {
    Value::Array(
        series
            .iter()
            .map(|s| {
                let datapoints: Vec<Value> = s
                    .values
                    .iter()
                    .zip(&s.absent)
                    .enumerate()
                    .map(|(i, (value, absent))| {
                        let timestamp = s.start_time + i as i64 * s.step_time;
                        let value = if *absent { Value::Null } else { json!(value) };
                        json!([value, timestamp])
                    })
                    .collect();
                json!({ "target": s.name, "datapoints": datapoints })
            })
            .collect(),
    )
}

fn retention_json(r: &Retention) -> Value {
    json!({
        "secondsPerPoint": r.seconds_per_point,
        "points": r.number_of_points,
    })
}

fn info_json(info: &InfoResponse) -> Value {
    json!({
        "name": info.name,
        "aggregationMethod": info.aggregation_method,
        "maxRetention": info.max_retention,
        "xFilesFactor": info.x_files_factor,
        "retentions": info.retentions.iter().map(retention_json).collect::<Vec<_>>(),
    })
}

/// `backend address -> info` per §3's `ZipperInfoResponse`.
pub fn info_json_map(info: &std::collections::BTreeMap<String, InfoResponse>) -> Value {
    Value::Object(info.iter().map(|(backend, i)| (backend.clone(), info_json(i))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_json_reports_path_and_leaf_flag() {
        let matches = vec![Match { path: "a.b".to_string(), is_leaf: true }];
        assert_eq!(find_json(&matches), json!([{ "path": "a.b", "is_leaf": true }]));
    }

    #[test]
    fn render_json_nulls_absent_datapoints() {
        let series = vec![FetchResponse {
            name: "a.b".to_string(),
            start_time: 0,
            stop_time: 120,
            step_time: 60,
            values: vec![1.0, 0.0],
            absent: vec![false, true],
        }];
        let rendered = render_json(&series);
        assert_eq!(rendered[0]["datapoints"][1][0], Value::Null);
        assert_eq!(rendered[0]["datapoints"][0][0], json!(1.0));
    }
}

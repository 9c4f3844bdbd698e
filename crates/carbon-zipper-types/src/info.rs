//! `InfoResponse` and its disjoint-key union merge (§3, §4.F "Info").

use crate::merge::Merge;
use crate::wire;
use std::collections::BTreeMap;

/// Retention policy for one archive of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Retention {
    pub seconds_per_point: i64,
    pub number_of_points: i64,
}

impl From<wire::Retention> for Retention {
    fn from(r: wire::Retention) -> Self {
        Retention { seconds_per_point: r.seconds_per_point, number_of_points: r.number_of_points }
    }
}

impl From<Retention> for wire::Retention {
    fn from(r: Retention) -> Self {
        wire::Retention { seconds_per_point: r.seconds_per_point, number_of_points: r.number_of_points }
    }
}

/// Per-backend series metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoResponse {
    pub name: String,
    pub aggregation_method: String,
    pub max_retention: i64,
    pub x_files_factor: f32,
    pub retentions: Vec<Retention>,
}

impl From<wire::InfoResponse> for InfoResponse {
    fn from(r: wire::InfoResponse) -> Self {
        InfoResponse {
            name: r.name,
            aggregation_method: r.aggregation_method,
            max_retention: r.max_retention,
            x_files_factor: r.x_files_factor,
            retentions: r.retentions.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<InfoResponse> for wire::InfoResponse {
    fn from(r: InfoResponse) -> Self {
        wire::InfoResponse {
            name: r.name,
            aggregation_method: r.aggregation_method,
            max_retention: r.max_retention,
            x_files_factor: r.x_files_factor,
            retentions: r.retentions.into_iter().map(Into::into).collect(),
        }
    }
}

/// The merged Info result: backend address -> its reported metadata. Keys
/// are disjoint by construction (each backend reports only for itself), so
/// the union never needs a conflict rule.
#[derive(Debug, Clone, Default)]
pub struct ZipperInfoResponse {
    pub info: BTreeMap<String, InfoResponse>,
}

impl ZipperInfoResponse {
    pub fn single(backend: impl Into<String>, info: InfoResponse) -> Self {
        let mut result = Self::default();
        result.info.insert(backend.into(), info);
        result
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }
}

impl From<wire::ZipperInfoResponse> for ZipperInfoResponse {
    fn from(r: wire::ZipperInfoResponse) -> Self {
        ZipperInfoResponse {
            info: r.info.into_iter().map(|(addr, info)| (addr, info.into())).collect(),
        }
    }
}

impl Merge for ZipperInfoResponse {
    fn merge(&mut self, other: Self) {
        self.info.extend(other.info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> InfoResponse {
        InfoResponse {
            name: name.to_string(),
            aggregation_method: "average".to_string(),
            max_retention: 31_536_000,
            x_files_factor: 0.5,
            retentions: vec![Retention { seconds_per_point: 60, number_of_points: 1440 }],
        }
    }

    #[test]
    fn disjoint_keys_union_without_conflict() {
        let mut a = ZipperInfoResponse::single("b1:8080", sample("a.b"));
        let b = ZipperInfoResponse::single("b2:8080", sample("a.b"));
        a.merge(b);
        assert_eq!(a.info.len(), 2);
    }
}

//! `Match`, `MultiGlobRequest`/`MultiGlobResponse` and their union merge (§3, §4.G).

use crate::merge::Merge;
use crate::wire;
use std::collections::BTreeMap;

/// One entry in a Find result: a metric namespace path and whether it is a
/// leaf (stores samples) or a directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Match {
    pub path: String,
    pub is_leaf: bool,
}

/// Re-exported under the name used by the wire schema (`GlobMatch` in
/// `zipper.proto`); kept as an alias so call sites can use either the
/// glossary term or the schema name.
pub type GlobMatch = Match;

impl From<wire::GlobMatch> for Match {
    fn from(m: wire::GlobMatch) -> Self {
        Match { path: m.path, is_leaf: m.is_leaf }
    }
}

impl From<Match> for wire::GlobMatch {
    fn from(m: Match) -> Self {
        wire::GlobMatch { path: m.path, is_leaf: m.is_leaf }
    }
}

/// A request to find matches for several glob patterns at once.
#[derive(Debug, Clone, Default)]
pub struct MultiGlobRequest {
    pub metrics: Vec<String>,
}

impl From<MultiGlobRequest> for wire::MultiGlobRequest {
    fn from(r: MultiGlobRequest) -> Self {
        wire::MultiGlobRequest { metrics: r.metrics }
    }
}

/// The merged Find result for one requested name: a set of matches, unioned
/// by path across every backend that answered (§4.F "Merge semantics").
#[derive(Debug, Clone, Default)]
pub struct MultiGlobResponse {
    /// Matches keyed by path; `is_leaf` is `true` if *any* backend reported
    /// the path as a leaf.
    pub matches: BTreeMap<String, bool>,
}

impl MultiGlobResponse {
    pub fn from_matches(matches: impl IntoIterator<Item = Match>) -> Self {
        let mut result = Self::default();
        for m in matches {
            result.insert(m);
        }
        result
    }

    pub fn insert(&mut self, m: Match) {
        let entry = self.matches.entry(m.path).or_insert(false);
        *entry |= m.is_leaf;
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn into_matches(self) -> Vec<Match> {
        self.matches.into_iter().map(|(path, is_leaf)| Match { path, is_leaf }).collect()
    }
}

impl From<wire::MultiGlobResponse> for MultiGlobResponse {
    fn from(r: wire::MultiGlobResponse) -> Self {
        let mut result = MultiGlobResponse::default();
        for glob in r.metrics {
            for m in glob.matches {
                result.insert(m.into());
            }
        }
        result
    }
}

impl Merge for MultiGlobResponse {
    fn merge(&mut self, other: Self) {
        for (path, is_leaf) in other.matches {
            let entry = self.matches.entry(path).or_insert(false);
            *entry |= is_leaf;
        }
    }
}

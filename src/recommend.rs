// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Recommendation fusion
//!
//! Every edge incident to the query repository is a vote for the repository
//! at its other end. Votes are grouped per candidate, reduced to one weight
//! per kind (the strongest), and combined as
//! `final = sum(c_kind * w_kind) / sum(c_kind)`, which stays in `[0, 1]`.

use crate::config::FusionSettings;
use crate::types::{Edge, EdgeKind, Recommendation};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Fuses per-kind edge weights into ranked recommendations
#[derive(Debug, Clone, Default)]
pub struct RecommendationFuser {
    settings: FusionSettings,
}

impl RecommendationFuser {
    /// Create with the given coefficients and exclusion policy
    #[must_use]
    pub fn new(settings: FusionSettings) -> Self {
        Self { settings }
    }

    /// Whether repositories sharing a collection with the query are skipped
    #[must_use]
    pub fn excludes_same_collection(&self) -> bool {
        self.settings.exclude_same_collection
    }

    /// Rank the candidates reachable from `repo` through `edges`
    ///
    /// `excluded` lists repositories never to recommend (already saved
    /// alongside `repo`); `repo` itself is always excluded.
    #[must_use]
    pub fn fuse(
        &self,
        repo: &str,
        edges: &[Edge],
        excluded: &BTreeSet<&str>,
        limit: Option<usize>,
    ) -> Vec<Recommendation> {
        let mut votes: BTreeMap<&str, BTreeMap<EdgeKind, f64>> = BTreeMap::new();
        for edge in edges {
            let Some(candidate) = edge.other_endpoint(repo) else {
                continue;
            };
            if candidate == repo || excluded.contains(candidate) {
                continue;
            }
            let best = votes
                .entry(candidate)
                .or_default()
                .entry(edge.edge_type)
                .or_insert(0.0);
            *best = best.max(edge.weight);
        }

        let weights = &self.settings.weights;
        let total = weights.total();
        let mut ranked: Vec<Recommendation> = votes
            .into_iter()
            .map(|(candidate, per_kind)| {
                let mut graph_score = None;
                let mut semantic_score = None;
                for (kind, weight) in &per_kind {
                    let contribution = if total > 0.0 {
                        weights.coefficient(*kind) * weight / total
                    } else {
                        0.0
                    };
                    match kind {
                        EdgeKind::Semantic => semantic_score = Some(*weight),
                        EdgeKind::Author
                        | EdgeKind::Dependency
                        | EdgeKind::Ecosystem
                        | EdgeKind::Collection => {
                            *graph_score.get_or_insert(0.0) += contribution;
                        }
                    }
                }
                let semantic_part = semantic_score
                    .map_or(0.0, |w| if total > 0.0 { weights.semantic * w / total } else { 0.0 });
                let final_score = (graph_score.unwrap_or(0.0) + semantic_part).clamp(0.0, 1.0);

                Recommendation {
                    name_with_owner: candidate.to_string(),
                    final_score,
                    sources: per_kind.keys().copied().collect(),
                    graph_score,
                    semantic_score,
                }
            })
            .filter(|r| r.final_score >= self.settings.min_score)
            .collect();

        ranked.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| b.sources.len().cmp(&a.sources.len()))
                .then_with(|| a.name_with_owner.cmp(&b.name_with_owner))
        });
        if let Some(limit) = limit {
            ranked.truncate(limit);
        }

        debug!("Fused {} recommendations for {repo}", ranked.len());
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionWeights;
    use serde_json::json;

    fn edge(a: &str, b: &str, kind: EdgeKind, w: f64) -> Edge {
        Edge::new(a, b, kind, w, json!({})).unwrap()
    }

    fn fuser() -> RecommendationFuser {
        RecommendationFuser::new(FusionSettings::default())
    }

    #[test]
    fn test_multi_source_candidate_scores_at_least_each_part() {
        let both = vec![
            edge("q/q", "c/c", EdgeKind::Author, 0.6),
            edge("q/q", "c/c", EdgeKind::Ecosystem, 0.5),
        ];
        let recs = fuser().fuse("q/q", &both, &BTreeSet::new(), None);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].sources, vec![EdgeKind::Author, EdgeKind::Ecosystem]);

        for single in &both {
            let alone = fuser().fuse("q/q", std::slice::from_ref(single), &BTreeSet::new(), None);
            assert!(recs[0].final_score >= alone[0].final_score);
        }
    }

    #[test]
    fn test_scores_split_into_graph_and_semantic() {
        let edges = vec![
            edge("q/q", "c/c", EdgeKind::Semantic, 0.9),
            edge("q/q", "c/c", EdgeKind::Collection, 1.0),
            edge("q/q", "s/s", EdgeKind::Semantic, 0.8),
        ];
        let recs = fuser().fuse("q/q", &edges, &BTreeSet::new(), None);

        let c = recs.iter().find(|r| r.name_with_owner == "c/c").unwrap();
        assert_eq!(c.semantic_score, Some(0.9));
        let graph = c.graph_score.unwrap();
        assert!((c.final_score - (graph + 0.2 * 0.9)).abs() < 1e-9);

        let s = recs.iter().find(|r| r.name_with_owner == "s/s").unwrap();
        assert!(s.graph_score.is_none());
        assert!(s.final_score <= 1.0);
    }

    #[test]
    fn test_strongest_edge_per_kind_counts_once() {
        let edges = vec![
            edge("q/q", "d/d", EdgeKind::Dependency, 0.5),
            edge("d/d", "q/q", EdgeKind::Dependency, 1.0),
        ];
        let recs = fuser().fuse("q/q", &edges, &BTreeSet::new(), None);
        assert_eq!(recs[0].sources, vec![EdgeKind::Dependency]);
        assert!((recs[0].final_score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_ties_prefer_more_sources_then_name() {
        let weights = FusionWeights {
            author: 1.0,
            dependency: 1.0,
            ecosystem: 1.0,
            collection: 1.0,
            semantic: 1.0,
        };
        let fuser = RecommendationFuser::new(FusionSettings {
            weights,
            ..FusionSettings::default()
        });
        let edges = vec![
            edge("q/q", "b/b", EdgeKind::Author, 0.5),
            edge("q/q", "b/b", EdgeKind::Ecosystem, 0.5),
            edge("q/q", "a/a", EdgeKind::Author, 1.0),
            edge("q/q", "z/z", EdgeKind::Semantic, 1.0),
        ];
        let names: Vec<String> = fuser
            .fuse("q/q", &edges, &BTreeSet::new(), None)
            .into_iter()
            .map(|r| r.name_with_owner)
            .collect();
        assert_eq!(names, vec!["b/b", "a/a", "z/z"]);
    }

    #[test]
    fn test_exclusions_min_score_and_limit() {
        let edges = vec![
            edge("q/q", "a/a", EdgeKind::Author, 1.0),
            edge("q/q", "b/b", EdgeKind::Author, 0.9),
            edge("q/q", "c/c", EdgeKind::Author, 0.1),
            edge("x/x", "y/y", EdgeKind::Author, 1.0),
        ];
        let excluded: BTreeSet<&str> = ["a/a"].into();

        let recs = fuser().fuse("q/q", &edges, &excluded, Some(1));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].name_with_owner, "b/b");

        let strict = RecommendationFuser::new(FusionSettings {
            min_score: 0.1,
            ..FusionSettings::default()
        });
        let recs = strict.fuse("q/q", &edges, &BTreeSet::new(), None);
        let names: Vec<&str> = recs.iter().map(|r| r.name_with_owner.as_str()).collect();
        assert_eq!(names, vec!["a/a", "b/b"]);
    }
}

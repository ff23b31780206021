// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `semantic` edges: cosine similarity of description embeddings
//!
//! A pair is linked when either endpoint has the other among its
//! `max_neighbors` most similar repositories above `threshold`. Scoped runs
//! evaluate the same rule, so their output equals the full output restricted
//! to the scoped repositories.

use super::{round_weight, Scope, SignalExtractor};
use crate::config::SemanticSettings;
use crate::corpus::Corpus;
use crate::error::{GraphError, Result};
use crate::types::{canonical_pair, EdgeDraft, EdgeKind};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Embedding similarity extractor
#[derive(Debug, Clone, Default)]
pub struct SemanticExtractor {
    settings: SemanticSettings,
}

/// Unit-normalized embeddings in corpus key order
struct EmbeddingSpace<'c> {
    ids: Vec<&'c str>,
    vectors: Vec<Vec<f64>>,
}

impl<'c> EmbeddingSpace<'c> {
    fn build(corpus: &'c Corpus) -> Result<Self> {
        let mut ids = Vec::new();
        let mut vectors = Vec::new();
        let mut dimension = None;

        for repo in corpus.repos() {
            let Some(embedding) = &repo.embedding else {
                continue;
            };
            let expected = *dimension.get_or_insert(embedding.len());
            if embedding.len() != expected {
                return Err(GraphError::Extractor {
                    kind: EdgeKind::Semantic,
                    message: format!(
                        "{} has a {}-dimensional embedding, expected {expected}",
                        repo.name_with_owner,
                        embedding.len()
                    ),
                });
            }
            if embedding.iter().any(|x| !x.is_finite()) {
                return Err(GraphError::Extractor {
                    kind: EdgeKind::Semantic,
                    message: format!("{} has a non-finite embedding", repo.name_with_owner),
                });
            }
            let norm = embedding.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
            if norm == 0.0 {
                continue;
            }
            ids.push(repo.name_with_owner.as_str());
            vectors.push(embedding.iter().map(|x| f64::from(*x) / norm).collect());
        }

        Ok(Self { ids, vectors })
    }

    fn similarity(&self, i: usize, j: usize) -> f64 {
        self.vectors[i]
            .iter()
            .zip(&self.vectors[j])
            .map(|(a, b)| a * b)
            .sum()
    }

    fn neighbors(&self, i: usize, threshold: f64, limit: usize) -> Vec<(usize, f64)> {
        let mut found: Vec<(usize, f64)> = (0..self.ids.len())
            .filter(|&j| j != i)
            .map(|j| (j, self.similarity(i, j)))
            .filter(|(_, s)| *s >= threshold)
            .collect();
        found.sort_by(|(ja, sa), (jb, sb)| sb.total_cmp(sa).then_with(|| self.ids[*ja].cmp(self.ids[*jb])));
        found.truncate(limit);
        found
    }
}

impl SemanticExtractor {
    /// Create with the given threshold and neighbor cap
    #[must_use]
    pub fn new(settings: SemanticSettings) -> Self {
        Self { settings }
    }
}

impl SignalExtractor for SemanticExtractor {
    fn kind(&self) -> EdgeKind {
        EdgeKind::Semantic
    }

    fn extract(&self, corpus: &Corpus, scope: &Scope) -> Result<Vec<EdgeDraft>> {
        let space = EmbeddingSpace::build(corpus)?;
        let threshold = self.settings.threshold;
        let limit = self.settings.max_neighbors;
        debug!("Semantic space: {} embedded repositories", space.ids.len());

        let mut pairs: BTreeMap<(String, String), f64> = BTreeMap::new();
        let mut link = |i: usize, j: usize, s: f64| {
            let key = canonical_pair(EdgeKind::Semantic, space.ids[i].to_string(), space.ids[j].to_string());
            pairs.insert(key, s);
        };

        // each list is computed once; scoping only filters the union
        for i in 0..space.ids.len() {
            for (j, s) in space.neighbors(i, threshold, limit) {
                if scope.covers_pair(space.ids[i], space.ids[j]) {
                    link(i, j, s);
                }
            }
        }

        Ok(pairs
            .into_iter()
            .map(|((source, target), s)| {
                EdgeDraft::new(source, target, round_weight(s.clamp(0.0, 1.0)), json!({ "metric": "cosine" }))
            })
            .collect())
    }
}

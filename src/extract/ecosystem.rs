// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `ecosystem` edges: shared topics and primary language

use super::{round_weight, PairAccumulator, Scope, SignalExtractor};
use crate::config::EcosystemSettings;
use crate::corpus::{Corpus, Repository};
use crate::error::Result;
use crate::types::{EdgeDraft, EdgeKind};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Topic/language extractor
#[derive(Debug, Clone, Default)]
pub struct EcosystemExtractor {
    settings: EcosystemSettings,
}

fn normalized_topics(repo: &Repository) -> BTreeSet<String> {
    repo.topics
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn normalized_language(repo: &Repository) -> Option<String> {
    repo.language
        .as_deref()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
}

impl EcosystemExtractor {
    /// Create with the given topic/language weights
    #[must_use]
    pub fn new(settings: EcosystemSettings) -> Self {
        Self { settings }
    }

    /// Weight for a pair with `shared_topics` topics in common
    #[must_use]
    pub fn weight(&self, shared_topics: usize, same_language: bool) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let topics = self.settings.per_topic * shared_topics as f64;
        let language = if same_language { self.settings.language_bonus } else { 0.0 };
        round_weight((topics + language).min(1.0))
    }
}

impl SignalExtractor for EcosystemExtractor {
    fn kind(&self) -> EdgeKind {
        EdgeKind::Ecosystem
    }

    fn extract(&self, corpus: &Corpus, scope: &Scope) -> Result<Vec<EdgeDraft>> {
        let mut by_topic: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        let mut by_language: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for repo in corpus.repos() {
            for topic in normalized_topics(repo) {
                by_topic.entry(topic).or_default().push(&repo.name_with_owner);
            }
            if let Some(language) = normalized_language(repo) {
                by_language.entry(language).or_default().push(&repo.name_with_owner);
            }
        }

        let mut pairs: PairAccumulator<BTreeSet<String>> = PairAccumulator::default();
        for (topic, members) in &by_topic {
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    if scope.covers_pair(a, b) {
                        pairs.entry(EdgeKind::Ecosystem, a, b).insert(topic.clone());
                    }
                }
            }
        }
        if self.settings.link_on_language {
            for members in by_language.values() {
                for (i, a) in members.iter().enumerate() {
                    for b in &members[i + 1..] {
                        if scope.covers_pair(a, b) {
                            pairs.entry(EdgeKind::Ecosystem, a, b);
                        }
                    }
                }
            }
        }

        Ok(pairs.into_drafts(|source, target, shared| {
            let language = corpus.get(source).and_then(normalized_language);
            let same_language =
                language.is_some() && language == corpus.get(target).and_then(normalized_language);
            let weight = self.weight(shared.len(), same_language);
            let language = if same_language { language } else { None };
            (weight > 0.0).then(|| {
                (weight, json!({ "shared_topics": shared, "language": language }))
            })
        }))
    }
}

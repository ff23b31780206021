// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Signal extractors - one per edge kind
//!
//! An extractor is a pure function of the corpus: it reads repository
//! metadata, never the edge store and never another extractor's output, and
//! returns drafts sorted by `(source, target)` so repeated runs are
//! identical.

pub mod author;
pub mod collection;
pub mod dependency;
pub mod ecosystem;
pub mod semantic;

use crate::config::ExtractorSettings;
use crate::corpus::Corpus;
use crate::error::Result;
use crate::types::{canonical_pair, EdgeDraft, EdgeKind};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub use author::AuthorExtractor;
pub use collection::CollectionExtractor;
pub use dependency::DependencyExtractor;
pub use ecosystem::EcosystemExtractor;
pub use semantic::SemanticExtractor;

/// Which repositories an extraction pass covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The whole corpus
    All,
    /// Only edges incident to these repositories
    Repos(BTreeSet<String>),
}

impl Scope {
    /// Whether an edge between `a` and `b` belongs to this pass
    #[must_use]
    pub fn covers_pair(&self, a: &str, b: &str) -> bool {
        match self {
            Self::All => true,
            Self::Repos(repos) => repos.contains(a) || repos.contains(b),
        }
    }

    /// Whether `repo` itself is in scope
    #[must_use]
    pub fn covers(&self, repo: &str) -> bool {
        match self {
            Self::All => true,
            Self::Repos(repos) => repos.contains(repo),
        }
    }
}

/// Derives the edges of exactly one kind
pub trait SignalExtractor: Send + Sync {
    /// Kind this extractor produces
    fn kind(&self) -> EdgeKind;

    /// Compute drafts for every in-scope edge of [`Self::kind`]
    fn extract(&self, corpus: &Corpus, scope: &Scope) -> Result<Vec<EdgeDraft>>;
}

/// The default extractor for every kind, configured from `settings`
#[must_use]
pub fn default_extractors(settings: &ExtractorSettings) -> Vec<Arc<dyn SignalExtractor>> {
    vec![
        Arc::new(AuthorExtractor::new(settings.author.clone())),
        Arc::new(DependencyExtractor::new(settings.dependency.clone())),
        Arc::new(EcosystemExtractor::new(settings.ecosystem.clone())),
        Arc::new(CollectionExtractor::new(settings.collection.clone())),
        Arc::new(SemanticExtractor::new(settings.semantic.clone())),
    ]
}

/// Round to four decimals so weights survive text round trips unchanged
#[must_use]
pub(crate) fn round_weight(w: f64) -> f64 {
    ((w * 10_000.0).round() / 10_000.0).clamp(0.0, 1.0)
}

/// Accumulates symmetric pair signals keyed canonically
#[derive(Debug, Default)]
pub(crate) struct PairAccumulator<T> {
    pairs: BTreeMap<(String, String), T>,
}

impl<T: Default> PairAccumulator<T> {
    /// Entry for the unordered pair `(a, b)`
    pub(crate) fn entry(&mut self, kind: EdgeKind, a: &str, b: &str) -> &mut T {
        let key = canonical_pair(kind, a.to_string(), b.to_string());
        self.pairs.entry(key).or_default()
    }

    /// Turn every accumulated pair into a draft, in key order
    pub(crate) fn into_drafts(
        self,
        mut finish: impl FnMut(&str, &str, T) -> Option<(f64, serde_json::Value)>,
    ) -> Vec<EdgeDraft> {
        self.pairs
            .into_iter()
            .filter_map(|((source, target), acc)| {
                finish(&source, &target, acc)
                    .map(|(weight, metadata)| EdgeDraft::new(source, target, weight, metadata))
            })
            .collect()
    }
}

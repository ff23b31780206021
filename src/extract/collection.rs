// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `collection` edges: co-membership in a user collection
//!
//! Smaller collections are a tighter signal, so the weight is
//! `min(1, pivot / size)`; a pair in several collections keeps the best one.

use super::{round_weight, PairAccumulator, Scope, SignalExtractor};
use crate::config::CollectionSettings;
use crate::corpus::Corpus;
use crate::error::Result;
use crate::types::{EdgeDraft, EdgeKind};
use serde_json::json;
use std::collections::BTreeSet;

/// Collection co-membership extractor
#[derive(Debug, Clone, Default)]
pub struct CollectionExtractor {
    settings: CollectionSettings,
}

#[derive(Debug, Default)]
struct Shared {
    weight: f64,
    collections: BTreeSet<String>,
}

impl CollectionExtractor {
    /// Create with the given pivot
    #[must_use]
    pub fn new(settings: CollectionSettings) -> Self {
        Self { settings }
    }

    /// Weight contributed by a collection of `size` members
    #[must_use]
    pub fn weight_for_size(&self, size: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let size = size.max(1) as f64;
        round_weight((self.settings.pivot / size).min(1.0))
    }
}

impl SignalExtractor for CollectionExtractor {
    fn kind(&self) -> EdgeKind {
        EdgeKind::Collection
    }

    fn extract(&self, corpus: &Corpus, scope: &Scope) -> Result<Vec<EdgeDraft>> {
        let mut pairs: PairAccumulator<Shared> = PairAccumulator::default();
        for collection in corpus.collections() {
            let members = &collection.members;
            if members.len() < 2 {
                continue;
            }
            let weight = self.weight_for_size(members.len());
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    if !scope.covers_pair(a, b) {
                        continue;
                    }
                    let shared = pairs.entry(EdgeKind::Collection, a, b);
                    shared.weight = shared.weight.max(weight);
                    shared.collections.insert(collection.id.clone());
                }
            }
        }

        Ok(pairs.into_drafts(|_, _, shared| {
            Some((shared.weight, json!({ "collections": shared.collections })))
        }))
    }
}

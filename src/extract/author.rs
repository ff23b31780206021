// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `author` edges: repositories sharing an owner
//!
//! Weight is `1 / (fanout - 1)^decay`, where fanout is the number of starred
//! repositories of that owner. An owner with two repositories yields 1.0 and
//! the weight never grows with fan-out, so prolific owners do not dominate.

use super::{round_weight, Scope, SignalExtractor};
use crate::config::AuthorSettings;
use crate::corpus::Corpus;
use crate::error::Result;
use crate::types::{EdgeDraft, EdgeKind};
use serde_json::json;
use std::collections::BTreeMap;

/// Same-owner extractor
#[derive(Debug, Clone, Default)]
pub struct AuthorExtractor {
    settings: AuthorSettings,
}

impl AuthorExtractor {
    /// Create with the given decay settings
    #[must_use]
    pub fn new(settings: AuthorSettings) -> Self {
        Self { settings }
    }

    /// Weight of an edge between two repositories of an owner with `fanout` repositories
    #[must_use]
    pub fn weight_for_fanout(&self, fanout: usize) -> f64 {
        if fanout <= 2 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let others = (fanout - 1) as f64;
        round_weight(1.0 / others.powf(self.settings.decay))
    }
}

impl SignalExtractor for AuthorExtractor {
    fn kind(&self) -> EdgeKind {
        EdgeKind::Author
    }

    fn extract(&self, corpus: &Corpus, scope: &Scope) -> Result<Vec<EdgeDraft>> {
        let mut by_owner: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for repo in corpus.repos() {
            by_owner
                .entry(repo.owner().to_lowercase())
                .or_default()
                .push(&repo.name_with_owner);
        }

        let mut drafts = Vec::new();
        for (owner, members) in &by_owner {
            if members.len() < 2 {
                continue;
            }
            let weight = self.weight_for_fanout(members.len());
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    if !scope.covers_pair(a, b) {
                        continue;
                    }
                    drafts.push(EdgeDraft::new(
                        *a,
                        *b,
                        weight,
                        json!({ "owner": owner, "owner_repos": members.len() }),
                    ));
                }
            }
        }

        drafts.sort_by(|x, y| (&x.source, &x.target).cmp(&(&y.source, &y.target)));
        Ok(drafts)
    }
}

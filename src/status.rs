// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Per-repository computation status (`graph_status`)

use crate::corpus::Corpus;
use crate::error::Result;
use crate::schema::{read_json, write_json_atomic, DataLayout};
use crate::types::GraphStatus;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StatusTable {
    #[serde(default)]
    rows: Vec<GraphStatus>,
}

/// Thread-safe status table; a missing row means "never computed"
#[derive(Debug, Default)]
pub struct StatusStore {
    rows: RwLock<BTreeMap<String, GraphStatus>>,
}

impl StatusStore {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `graph_status.json`
    pub fn load(layout: &DataLayout) -> Result<Self> {
        let table: StatusTable = read_json(&layout.status())?.unwrap_or_default();
        let rows = table
            .rows
            .into_iter()
            .map(|row| (row.repo_id.clone(), row))
            .collect();
        Ok(Self {
            rows: RwLock::new(rows),
        })
    }

    /// Persist `graph_status.json`
    pub fn save(&self, layout: &DataLayout) -> Result<()> {
        write_json_atomic(&layout.status(), &StatusTable { rows: self.all() })
    }

    /// Row of one repository
    #[must_use]
    pub fn get(&self, repo: &str) -> Option<GraphStatus> {
        self.rows.read().get(repo).cloned()
    }

    /// All rows ordered by repository
    #[must_use]
    pub fn all(&self) -> Vec<GraphStatus> {
        self.rows.read().values().cloned().collect()
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether no repository has ever been computed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Stamp `edges_computed_at = at` on every repository in `repos`,
    /// copying its manifest parse time from the corpus
    pub fn mark_computed<'a>(
        &self,
        repos: impl IntoIterator<Item = &'a str>,
        corpus: &Corpus,
        at: DateTime<Utc>,
    ) -> usize {
        let mut rows = self.rows.write();
        let mut touched = 0;
        for repo in repos {
            let parsed = corpus.get(repo).and_then(|r| r.manifest_parsed_at);
            let row = rows.entry(repo.to_string()).or_insert_with(|| GraphStatus {
                repo_id: repo.to_string(),
                edges_computed_at: None,
                dependencies_parsed_at: None,
            });
            row.edges_computed_at = Some(at);
            if parsed.is_some() {
                row.dependencies_parsed_at = parsed;
            }
            touched += 1;
        }
        touched
    }

    /// Drop the row of a removed repository
    pub fn remove(&self, repo: &str) -> bool {
        self.rows.write().remove(repo).is_some()
    }

    /// Drop rows of repositories no longer in the corpus
    pub fn retain_known(&self, corpus: &Corpus) -> usize {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|repo, _| corpus.contains(repo));
        before - rows.len()
    }

    /// Most recent `edges_computed_at`
    #[must_use]
    pub fn latest_computed_at(&self) -> Option<DateTime<Utc>> {
        self.rows
            .read()
            .values()
            .filter_map(|r| r.edges_computed_at)
            .max()
    }

    /// Whether `repo` needs recomputation
    #[must_use]
    pub fn is_stale(&self, corpus: &Corpus, repo: &str) -> bool {
        let computed = self.rows.read().get(repo).and_then(|r| r.edges_computed_at);
        match computed {
            None => true,
            Some(at) => corpus
                .get(repo)
                .and_then(|r| r.updated_at)
                .is_some_and(|updated| updated > at),
        }
    }

    /// Corpus repositories that need recomputation, in key order
    #[must_use]
    pub fn stale_repos(&self, corpus: &Corpus) -> Vec<String> {
        corpus
            .ids()
            .filter(|id| self.is_stale(corpus, id))
            .map(String::from)
            .collect()
    }
}

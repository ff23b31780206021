// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Edge store - durable table of typed weighted edges
//!
//! Keyed by `(source, target, kind)`. Every write validates the whole batch
//! before taking the lock, so a rejected batch leaves the table untouched.

use crate::error::{GraphError, Result};
use crate::schema::{read_json, write_json_atomic, DataLayout};
use crate::types::{Edge, EdgeKey, EdgeKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// On-disk shape of `edges.json`
#[derive(Debug, Default, Serialize, Deserialize)]
struct EdgeTable {
    #[serde(default)]
    edges: Vec<Edge>,
}

/// Thread-safe edge table
#[derive(Debug, Default)]
pub struct EdgeStore {
    edges: RwLock<BTreeMap<EdgeKey, Edge>>,
}

impl EdgeStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-stamped edges
    pub fn from_edges(edges: Vec<Edge>) -> Result<Self> {
        let map = validate_batch(edges, |_| Ok(()))?;
        Ok(Self {
            edges: RwLock::new(map),
        })
    }

    /// Load the edge table of a data directory
    pub fn load(layout: &DataLayout) -> Result<Self> {
        let table: EdgeTable = read_json(&layout.edges())?.unwrap_or_default();
        let store = Self::from_edges(table.edges)?;
        debug!("Loaded {} edges from {}", store.len(), layout.edges().display());
        Ok(store)
    }

    /// Persist the edge table
    pub fn save(&self, layout: &DataLayout) -> Result<()> {
        let table = EdgeTable { edges: self.all() };
        write_json_atomic(&layout.edges(), &table)
    }

    /// Insert or replace edges by key; all-or-nothing
    pub fn upsert(&self, edges: Vec<Edge>) -> Result<usize> {
        let batch = validate_batch(edges, |_| Ok(()))?;
        let written = batch.len();
        let mut guard = self.edges.write();
        for (key, edge) in batch {
            let merged = merge(guard.get(&key), edge);
            guard.insert(key, merged);
        }
        Ok(written)
    }

    /// Atomically swap every edge of `kind` for `edges`
    pub fn replace_kind(&self, kind: EdgeKind, edges: Vec<Edge>) -> Result<usize> {
        let batch = validate_batch(edges, |edge| expect_kind(edge, kind))?;
        let written = batch.len();

        let mut guard = self.edges.write();
        let (mut previous, kept): (BTreeMap<_, _>, BTreeMap<_, _>) =
            std::mem::take(&mut *guard).into_iter().partition(|(k, _)| k.kind == kind);
        *guard = kept;
        for (key, edge) in batch {
            let merged = merge(previous.remove(&key).as_ref(), edge);
            guard.insert(key, merged);
        }
        debug!("Replaced {kind} edges: {} removed, {written} written", previous.len());
        Ok(written)
    }

    /// Atomically swap the edges of `kind` incident to any of `repos`
    ///
    /// Edges of the batch must themselves touch `repos`; edges elsewhere in
    /// the table are never modified.
    pub fn replace_incident(
        &self,
        kind: EdgeKind,
        repos: &BTreeSet<String>,
        edges: Vec<Edge>,
    ) -> Result<usize> {
        let batch = validate_batch(edges, |edge| {
            expect_kind(edge, kind)?;
            if repos.contains(&edge.source_repo) || repos.contains(&edge.target_repo) {
                Ok(())
            } else {
                Err(GraphError::validation(format!(
                    "{kind} edge {} -> {} lies outside the rebuild scope",
                    edge.source_repo, edge.target_repo
                )))
            }
        })?;
        let written = batch.len();

        let mut guard = self.edges.write();
        let stale: Vec<EdgeKey> = guard
            .keys()
            .filter(|k| k.kind == kind && (repos.contains(&k.source) || repos.contains(&k.target)))
            .cloned()
            .collect();
        let mut previous = BTreeMap::new();
        for key in stale {
            if let Some(edge) = guard.remove(&key) {
                previous.insert(key, edge);
            }
        }
        for (key, edge) in batch {
            let merged = merge(previous.get(&key), edge);
            guard.insert(key, merged);
        }
        Ok(written)
    }

    /// Remove every edge touching `repo`
    pub fn delete_for_repo(&self, repo: &str) -> usize {
        let mut guard = self.edges.write();
        let before = guard.len();
        guard.retain(|k, _| k.source != repo && k.target != repo);
        before - guard.len()
    }

    /// Edges where `repo` is source or target, heaviest first
    #[must_use]
    pub fn query(&self, repo: &str, kinds: Option<&[EdgeKind]>) -> Vec<Edge> {
        let guard = self.edges.read();
        let mut edges: Vec<Edge> = guard
            .values()
            .filter(|e| e.touches(repo))
            .filter(|e| kinds.map_or(true, |ks| ks.contains(&e.edge_type)))
            .cloned()
            .collect();
        drop(guard);
        edges.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.source_repo.cmp(&b.source_repo))
                .then_with(|| a.target_repo.cmp(&b.target_repo))
                .then_with(|| a.edge_type.cmp(&b.edge_type))
        });
        edges
    }

    /// Whether any edge touches `repo`
    #[must_use]
    pub fn contains_repo(&self, repo: &str) -> bool {
        self.edges.read().values().any(|e| e.touches(repo))
    }

    /// Every repository appearing as an endpoint
    #[must_use]
    pub fn repos(&self) -> BTreeSet<String> {
        let guard = self.edges.read();
        let mut repos = BTreeSet::new();
        for key in guard.keys() {
            repos.insert(key.source.clone());
            repos.insert(key.target.clone());
        }
        repos
    }

    /// Every edge in key order
    #[must_use]
    pub fn all(&self) -> Vec<Edge> {
        self.edges.read().values().cloned().collect()
    }

    /// Number of edges
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.read().len()
    }

    /// Whether the store has no edges
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.read().is_empty()
    }

    /// Edge counts per kind (kinds without edges are omitted)
    #[must_use]
    pub fn count_by_kind(&self) -> BTreeMap<EdgeKind, usize> {
        let mut counts = BTreeMap::new();
        for key in self.edges.read().keys() {
            *counts.entry(key.kind).or_insert(0) += 1;
        }
        counts
    }

    /// SHA-256 over keys, weights and metadata, ignoring timestamps
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for edge in self.edges.read().values() {
            hasher.update(edge.source_repo.as_bytes());
            hasher.update(b"\0");
            hasher.update(edge.target_repo.as_bytes());
            hasher.update(b"\0");
            hasher.update(edge.edge_type.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(edge.weight.to_bits().to_le_bytes());
            hasher.update(edge.metadata.to_string().as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

fn expect_kind(edge: &Edge, kind: EdgeKind) -> Result<()> {
    if edge.edge_type == kind {
        Ok(())
    } else {
        Err(GraphError::validation(format!(
            "{} edge {} -> {} written as {kind}",
            edge.edge_type, edge.source_repo, edge.target_repo
        )))
    }
}

fn validate_batch(
    edges: Vec<Edge>,
    check: impl Fn(&Edge) -> Result<()>,
) -> Result<BTreeMap<EdgeKey, Edge>> {
    let mut batch = BTreeMap::new();
    for edge in edges {
        edge.validate()?;
        check(&edge)?;
        let key = edge.key();
        if batch.contains_key(&key) {
            return Err(GraphError::validation(format!(
                "duplicate {} edge {} -> {} in one write",
                key.kind, key.source, key.target
            )));
        }
        batch.insert(key, edge);
    }
    Ok(batch)
}

/// Keep the stored row when nothing changed; otherwise keep its `created_at`
fn merge(existing: Option<&Edge>, mut incoming: Edge) -> Edge {
    match existing {
        Some(old) if old.same_content(&incoming) => old.clone(),
        Some(old) => {
            incoming.created_at = old.created_at;
            incoming
        }
        None => incoming,
    }
}

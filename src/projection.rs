// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Projection cache - bounded node/edge subset for the network view
//!
//! The snapshot is a pure function of the edge store and `(top_n, k)`:
//!
//! 1. importance of a node is the sum of its incident edge weights; the
//!    `top_n` most important nodes are kept (ties by name);
//! 2. each kept node keeps its `k` heaviest edges to other kept nodes
//!    (ties by the other endpoint's name, then kind).
//!
//! Snapshots are built off to the side and published by swapping an `Arc`,
//! so readers see either the previous snapshot or the new one.

use crate::error::{Result, StaleCacheWarning};
use crate::schema::{read_json, write_json_atomic, DataLayout};
use crate::store::EdgeStore;
use crate::types::{Edge, EdgeKind};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Knobs of the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectionParams {
    /// Repositories retained
    pub top_n: usize,
    /// Edges kept per retained repository
    pub k: usize,
}

/// A retained repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedNode {
    /// Repository (`owner/name`)
    pub id: String,
    /// Sum of incident edge weights over the whole store
    pub importance: f64,
    /// Edges of this node within the projection
    pub degree: usize,
}

/// A retained edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedEdge {
    /// Source repository
    pub source: String,
    /// Target repository
    pub target: String,
    /// Relationship kind
    pub edge_type: EdgeKind,
    /// Edge weight
    pub weight: f64,
}

/// A computed projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSnapshot {
    /// Nodes, most important first
    pub nodes: Vec<ProjectedNode>,
    /// Edges, heaviest first
    pub edges: Vec<ProjectedEdge>,
    /// Parameters the snapshot was computed with
    pub params: ProjectionParams,
    /// Connected components among the retained nodes
    #[serde(default)]
    pub components: usize,
    /// When the snapshot was computed
    pub updated_at: DateTime<Utc>,
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

impl ProjectionSnapshot {
    /// Compute a snapshot from `edges`
    #[must_use]
    pub fn compute(edges: &[Edge], params: ProjectionParams) -> Self {
        let mut ordered: Vec<&Edge> = edges.iter().collect();
        ordered.sort_by(|a, b| {
            (&a.source_repo, &a.target_repo, a.edge_type).cmp(&(&b.source_repo, &b.target_repo, b.edge_type))
        });

        let mut importance: BTreeMap<&str, f64> = BTreeMap::new();
        for edge in &ordered {
            *importance.entry(&edge.source_repo).or_insert(0.0) += edge.weight;
            *importance.entry(&edge.target_repo).or_insert(0.0) += edge.weight;
        }
        let mut ranked: Vec<(&str, f64)> = importance.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(params.top_n);
        let retained: BTreeSet<&str> = ranked.iter().map(|(id, _)| *id).collect();

        let mut incident: BTreeMap<&str, Vec<&Edge>> = BTreeMap::new();
        for edge in &ordered {
            if retained.contains(edge.source_repo.as_str()) && retained.contains(edge.target_repo.as_str()) {
                incident.entry(&edge.source_repo).or_default().push(edge);
                incident.entry(&edge.target_repo).or_default().push(edge);
            }
        }

        let mut kept: BTreeMap<(&str, &str, EdgeKind), &Edge> = BTreeMap::new();
        for (node, mut candidates) in incident {
            candidates.sort_by(|a, b| {
                let other_a = a.other_endpoint(node).unwrap_or_default();
                let other_b = b.other_endpoint(node).unwrap_or_default();
                b.weight
                    .total_cmp(&a.weight)
                    .then_with(|| other_a.cmp(other_b))
                    .then_with(|| a.edge_type.cmp(&b.edge_type))
            });
            for edge in candidates.into_iter().take(params.k) {
                kept.insert((edge.source_repo.as_str(), edge.target_repo.as_str(), edge.edge_type), edge);
            }
        }

        let mut projected: Vec<ProjectedEdge> = kept
            .values()
            .map(|e| ProjectedEdge {
                source: e.source_repo.clone(),
                target: e.target_repo.clone(),
                edge_type: e.edge_type,
                weight: e.weight,
            })
            .collect();
        projected.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
                .then_with(|| a.edge_type.cmp(&b.edge_type))
        });

        let mut graph: UnGraph<&str, f64> = UnGraph::new_undirected();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for (id, _) in &ranked {
            index.insert(*id, graph.add_node(*id));
        }
        for edge in &projected {
            graph.add_edge(index[edge.source.as_str()], index[edge.target.as_str()], edge.weight);
        }

        let nodes = ranked
            .iter()
            .map(|(id, score)| ProjectedNode {
                id: (*id).to_string(),
                importance: round4(*score),
                degree: graph.edges(index[id]).count(),
            })
            .collect();

        Self {
            nodes,
            edges: projected,
            params,
            components: petgraph::algo::connected_components(&graph),
            updated_at: Utc::now(),
        }
    }

    /// Export to Graphviz DOT
    #[must_use]
    pub fn to_dot(&self) -> String {
        let quote = |s: &str| s.replace('"', "\\\"");
        let mut dot = String::from("digraph stargraph {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=box, style=rounded];\n\n");

        for node in &self.nodes {
            let _ = writeln!(
                dot,
                "  \"{}\" [label=\"{}\\n{:.2}\"];",
                quote(&node.id),
                quote(&node.id),
                node.importance
            );
        }

        dot.push('\n');

        for edge in &self.edges {
            let dir = if edge.edge_type.is_directional() { "" } else { ", dir=none" };
            let _ = writeln!(
                dot,
                "  \"{}\" -> \"{}\" [label=\"{} {:.2}\"{dir}];",
                quote(&edge.source),
                quote(&edge.target),
                edge.edge_type,
                edge.weight
            );
        }

        dot.push_str("}\n");
        dot
    }
}

/// On-disk shape of `network_cache.json`
#[derive(Debug, Serialize, Deserialize)]
struct NetworkCacheRow {
    #[serde(flatten)]
    snapshot: ProjectionSnapshot,
    #[serde(default)]
    invalidated: bool,
}

/// Summary of the cache for status reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    /// Parameters of the stored snapshot
    pub params: Option<ProjectionParams>,
    /// When the stored snapshot was computed
    pub updated_at: Option<DateTime<Utc>>,
    /// Node count
    pub nodes: usize,
    /// Edge count
    pub edges: usize,
    /// Whether a newer graph state exists
    pub stale: bool,
}

/// Owned, swappable handle to the current snapshot
#[derive(Debug, Default)]
pub struct ProjectionCache {
    current: RwLock<Option<Arc<ProjectionSnapshot>>>,
    invalidated: AtomicBool,
    path: Option<PathBuf>,
}

impl ProjectionCache {
    /// In-memory cache with nothing computed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache backed by `network_cache.json`
    pub fn load(layout: &DataLayout) -> Result<Self> {
        let path = layout.network_cache();
        let row: Option<NetworkCacheRow> = read_json(&path)?;
        let (current, invalidated) = match row {
            Some(row) => (Some(Arc::new(row.snapshot)), row.invalidated),
            None => (None, false),
        };
        Ok(Self {
            current: RwLock::new(current),
            invalidated: AtomicBool::new(invalidated),
            path: Some(path),
        })
    }

    /// The published snapshot, whatever its parameters
    #[must_use]
    pub fn current(&self) -> Option<Arc<ProjectionSnapshot>> {
        self.current.read().clone()
    }

    /// The published snapshot if it was computed with `params`
    #[must_use]
    pub fn get(&self, params: ProjectionParams) -> Option<Arc<ProjectionSnapshot>> {
        self.current().filter(|s| s.params == params)
    }

    /// Recompute from the full store and publish
    pub fn rebuild(&self, store: &EdgeStore, params: ProjectionParams) -> Result<Arc<ProjectionSnapshot>> {
        let snapshot = Arc::new(ProjectionSnapshot::compute(&store.all(), params));
        if let Some(path) = &self.path {
            write_json_atomic(
                path,
                &NetworkCacheRow {
                    snapshot: (*snapshot).clone(),
                    invalidated: false,
                },
            )?;
        }
        *self.current.write() = Some(Arc::clone(&snapshot));
        self.invalidated.store(false, Ordering::SeqCst);
        info!(
            "Projection rebuilt: {} nodes, {} edges (top_n={}, k={})",
            snapshot.nodes.len(),
            snapshot.edges.len(),
            params.top_n,
            params.k
        );
        Ok(snapshot)
    }

    /// Mark the snapshot stale without recomputing it
    pub fn invalidate(&self) -> Result<()> {
        self.invalidated.store(true, Ordering::SeqCst);
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(snapshot) = self.current() {
            write_json_atomic(
                path,
                &NetworkCacheRow {
                    snapshot: (*snapshot).clone(),
                    invalidated: true,
                },
            )?;
        }
        debug!("Projection cache invalidated");
        Ok(())
    }

    /// Whether a rebuild invalidated the snapshot
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    /// Warning for `snapshot` given the latest status change, if it is outdated
    #[must_use]
    pub fn staleness(
        &self,
        snapshot: &ProjectionSnapshot,
        latest_status_at: Option<DateTime<Utc>>,
    ) -> Option<StaleCacheWarning> {
        let outdated = latest_status_at.is_some_and(|at| snapshot.updated_at < at);
        (outdated || self.is_invalidated()).then(|| StaleCacheWarning {
            cache_updated_at: snapshot.updated_at,
            latest_status_at,
        })
    }

    /// Summary for status reporting
    #[must_use]
    pub fn status(&self, latest_status_at: Option<DateTime<Utc>>) -> CacheStatus {
        match self.current() {
            Some(snapshot) => CacheStatus {
                params: Some(snapshot.params),
                updated_at: Some(snapshot.updated_at),
                nodes: snapshot.nodes.len(),
                edges: snapshot.edges.len(),
                stale: self.staleness(&snapshot, latest_status_at).is_some(),
            },
            None => CacheStatus {
                params: None,
                updated_at: None,
                nodes: 0,
                edges: 0,
                stale: true,
            },
        }
    }
}

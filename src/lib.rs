// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Stargraph library - relationship graph for your starred repositories
//!
//! This crate derives typed, weighted edges between repositories from
//! independent signals, keeps them incrementally up to date, serves a
//! bounded projection for visualization and fuses the same edges into
//! ranked per-repository recommendations.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod error;
pub mod extract;
pub mod projection;
pub mod recommend;
pub mod schema;
pub mod service;
pub mod status;
pub mod store;

/// Core data types shared by every component
pub mod types {
    use crate::error::GraphError;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::str::FromStr;

    // =========================================================================
    // Edge Kinds
    // =========================================================================

    /// The closed set of relationship kinds between two repositories
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum EdgeKind {
        /// Same owner
        Author,
        /// Source depends on target (directional)
        Dependency,
        /// Shared language and/or topics
        Ecosystem,
        /// Co-membership in a user collection
        Collection,
        /// Embedding similarity
        Semantic,
    }

    impl EdgeKind {
        /// Every kind, in declaration order
        pub const ALL: [Self; 5] = [
            Self::Author,
            Self::Dependency,
            Self::Ecosystem,
            Self::Collection,
            Self::Semantic,
        ];

        /// Wire name of this kind
        #[must_use]
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::Author => "author",
                Self::Dependency => "dependency",
                Self::Ecosystem => "ecosystem",
                Self::Collection => "collection",
                Self::Semantic => "semantic",
            }
        }

        /// Whether edges of this kind keep the direction they were derived in.
        ///
        /// Symmetric kinds are stored once, with `source < target`.
        #[must_use]
        pub fn is_directional(&self) -> bool {
            matches!(self, Self::Dependency)
        }
    }

    impl fmt::Display for EdgeKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for EdgeKind {
        type Err = GraphError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "author" => Ok(Self::Author),
                "dependency" => Ok(Self::Dependency),
                "ecosystem" => Ok(Self::Ecosystem),
                "collection" => Ok(Self::Collection),
                "semantic" => Ok(Self::Semantic),
                other => Err(GraphError::validation(format!(
                    "unknown edge kind '{other}'. Valid: author, dependency, ecosystem, collection, semantic"
                ))),
            }
        }
    }

    // =========================================================================
    // Edge
    // =========================================================================

    /// Primary identity of an edge: at most one edge per kind per ordered pair
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct EdgeKey {
        /// Source repository (`owner/name`)
        pub source: String,
        /// Target repository (`owner/name`)
        pub target: String,
        /// Edge kind
        pub kind: EdgeKind,
    }

    /// Typed, weighted relationship between two repositories
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Edge {
        /// Source repository
        pub source_repo: String,
        /// Target repository
        pub target_repo: String,
        /// Relationship kind
        pub edge_type: EdgeKind,
        /// Normalized strength in `[0, 1]`
        pub weight: f64,
        /// Kind-specific explanation data, never used for scoring
        #[serde(default)]
        pub metadata: serde_json::Value,
        /// First time this key was written
        pub created_at: DateTime<Utc>,
        /// Last time weight or metadata changed
        pub updated_at: DateTime<Utc>,
    }

    impl Edge {
        /// Build a validated edge, applying the direction policy of `kind`
        pub fn new(
            source: impl Into<String>,
            target: impl Into<String>,
            kind: EdgeKind,
            weight: f64,
            metadata: serde_json::Value,
        ) -> Result<Self, GraphError> {
            let (source, target) = canonical_pair(kind, source.into(), target.into());
            let now = Utc::now();
            let edge = Self {
                source_repo: source,
                target_repo: target,
                edge_type: kind,
                weight,
                metadata,
                created_at: now,
                updated_at: now,
            };
            edge.validate()?;
            Ok(edge)
        }

        /// Check the write-time invariants of an edge
        pub fn validate(&self) -> Result<(), GraphError> {
            if !self.weight.is_finite() || !(0.0..=1.0).contains(&self.weight) {
                return Err(GraphError::validation(format!(
                    "{} edge {} -> {} has weight {} outside [0, 1]",
                    self.edge_type, self.source_repo, self.target_repo, self.weight
                )));
            }
            if self.source_repo.is_empty() || self.target_repo.is_empty() {
                return Err(GraphError::validation(format!(
                    "{} edge has an empty endpoint",
                    self.edge_type
                )));
            }
            if self.source_repo == self.target_repo {
                return Err(GraphError::validation(format!(
                    "{} edge is a self-loop on {}",
                    self.edge_type, self.source_repo
                )));
            }
            if !self.edge_type.is_directional() && self.source_repo > self.target_repo {
                return Err(GraphError::validation(format!(
                    "{} edge {} -> {} is not in canonical direction",
                    self.edge_type, self.source_repo, self.target_repo
                )));
            }
            Ok(())
        }

        /// The compound primary key
        #[must_use]
        pub fn key(&self) -> EdgeKey {
            EdgeKey {
                source: self.source_repo.clone(),
                target: self.target_repo.clone(),
                kind: self.edge_type,
            }
        }

        /// Whether `repo` is either endpoint
        #[must_use]
        pub fn touches(&self, repo: &str) -> bool {
            self.source_repo == repo || self.target_repo == repo
        }

        /// The endpoint opposite to `repo`, if `repo` is an endpoint
        #[must_use]
        pub fn other_endpoint(&self, repo: &str) -> Option<&str> {
            if self.source_repo == repo {
                Some(&self.target_repo)
            } else if self.target_repo == repo {
                Some(&self.source_repo)
            } else {
                None
            }
        }

        /// Same key, weight and metadata; timestamps ignored
        #[must_use]
        pub fn same_content(&self, other: &Self) -> bool {
            self.source_repo == other.source_repo
                && self.target_repo == other.target_repo
                && self.edge_type == other.edge_type
                && self.weight.to_bits() == other.weight.to_bits()
                && self.metadata == other.metadata
        }
    }

    /// Order the endpoints of a symmetric kind so `source < target`
    #[must_use]
    pub fn canonical_pair(kind: EdgeKind, source: String, target: String) -> (String, String) {
        if !kind.is_directional() && source > target {
            (target, source)
        } else {
            (source, target)
        }
    }

    /// Extractor output: an edge before it is stamped with a kind and timestamps
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EdgeDraft {
        /// Source repository
        pub source: String,
        /// Target repository
        pub target: String,
        /// Proposed weight
        pub weight: f64,
        /// Explanation data
        pub metadata: serde_json::Value,
    }

    impl EdgeDraft {
        /// Create a draft
        pub fn new(
            source: impl Into<String>,
            target: impl Into<String>,
            weight: f64,
            metadata: serde_json::Value,
        ) -> Self {
            Self {
                source: source.into(),
                target: target.into(),
                weight,
                metadata,
            }
        }

        /// Stamp this draft as an edge of `kind`
        pub fn into_edge(self, kind: EdgeKind) -> Result<Edge, GraphError> {
            Edge::new(self.source, self.target, kind, self.weight, self.metadata)
        }
    }

    // =========================================================================
    // Graph Status
    // =========================================================================

    /// Per-repository computation timestamps
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GraphStatus {
        /// Repository (`owner/name`)
        pub repo_id: String,
        /// Last time this repository's edges were derived
        pub edges_computed_at: Option<DateTime<Utc>>,
        /// Last time this repository's dependency manifest was parsed
        pub dependencies_parsed_at: Option<DateTime<Utc>>,
    }

    // =========================================================================
    // Recommendation
    // =========================================================================

    /// A ranked recommendation with provenance
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Recommendation {
        /// Recommended repository
        pub name_with_owner: String,
        /// Fused score in `[0, 1]`
        pub final_score: f64,
        /// Edge kinds that contributed, sorted
        pub sources: Vec<EdgeKind>,
        /// Sum of the non-semantic contributions
        #[serde(skip_serializing_if = "Option::is_none")]
        pub graph_score: Option<f64>,
        /// Semantic similarity, when a semantic edge exists
        #[serde(skip_serializing_if = "Option::is_none")]
        pub semantic_score: Option<f64>,
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{GraphError, Result};
    pub use crate::types::*;
}

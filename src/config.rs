// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Settings come from defaults, then an optional TOML file, then
//! `STARGRAPH__SECTION__KEY` environment variables.

use crate::error::GraphError;
use crate::types::EdgeKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory for persistent data (corpus, edges, status, cache)
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Per-kind extractor knobs
    pub extractors: ExtractorSettings,
    /// Recommendation fusion
    pub fusion: FusionSettings,
    /// Default projection parameters
    pub projection: ProjectionSettings,
    /// Rebuild orchestration
    pub rebuild: RebuildSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            extractors: ExtractorSettings::default(),
            fusion: FusionSettings::default(),
            projection: ProjectionSettings::default(),
            rebuild: RebuildSettings::default(),
        }
    }
}

/// Platform data directory, or `./.stargraph` when none can be resolved
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "hyperpolymath", "stargraph")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".stargraph"))
}

/// Knobs of all five extractors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    /// `author` extractor
    pub author: AuthorSettings,
    /// `dependency` extractor
    pub dependency: DependencySettings,
    /// `ecosystem` extractor
    pub ecosystem: EcosystemSettings,
    /// `collection` extractor
    pub collection: CollectionSettings,
    /// `semantic` extractor
    pub semantic: SemanticSettings,
}

/// Same-owner edges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorSettings {
    /// Exponent of the fan-out decay; 0 gives a constant weight of 1.0
    pub decay: f64,
}

impl Default for AuthorSettings {
    fn default() -> Self {
        Self { decay: 0.5 }
    }
}

/// Manifest edges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencySettings {
    /// Weight of a declared dependency
    pub direct_weight: f64,
    /// Weight of a lockfile-only dependency
    pub transitive_weight: f64,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            direct_weight: 1.0,
            transitive_weight: 0.5,
        }
    }
}

/// Language/topic edges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EcosystemSettings {
    /// Weight added per shared topic
    pub per_topic: f64,
    /// Weight added when the primary language matches
    pub language_bonus: f64,
    /// Link pairs that share only a language
    pub link_on_language: bool,
}

impl Default for EcosystemSettings {
    fn default() -> Self {
        Self {
            per_topic: 0.25,
            language_bonus: 0.2,
            link_on_language: false,
        }
    }
}

/// Collection co-membership edges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    /// Collection size that still yields weight 1.0
    pub pivot: f64,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self { pivot: 2.0 }
    }
}

/// Embedding similarity edges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticSettings {
    /// Minimum cosine similarity
    pub threshold: f64,
    /// Neighbors kept per repository
    pub max_neighbors: usize,
}

impl Default for SemanticSettings {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            max_neighbors: 10,
        }
    }
}

/// Per-kind fusion coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    /// Same owner
    pub author: f64,
    /// Manifest dependency
    pub dependency: f64,
    /// Shared language/topics
    pub ecosystem: f64,
    /// Shared collection
    pub collection: f64,
    /// Embedding similarity
    pub semantic: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            author: 0.2,
            dependency: 0.25,
            ecosystem: 0.2,
            collection: 0.15,
            semantic: 0.2,
        }
    }
}

impl FusionWeights {
    /// Coefficient for `kind`
    #[must_use]
    pub fn coefficient(&self, kind: EdgeKind) -> f64 {
        match kind {
            EdgeKind::Author => self.author,
            EdgeKind::Dependency => self.dependency,
            EdgeKind::Ecosystem => self.ecosystem,
            EdgeKind::Collection => self.collection,
            EdgeKind::Semantic => self.semantic,
        }
    }

    /// Sum of all coefficients, the normalizer of the fused score
    #[must_use]
    pub fn total(&self) -> f64 {
        EdgeKind::ALL.iter().map(|k| self.coefficient(*k)).sum()
    }
}

/// Recommendation fusion policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    /// Per-kind coefficients
    pub weights: FusionWeights,
    /// Drop candidates that already share a collection with the query
    pub exclude_same_collection: bool,
    /// Drop candidates scoring below this
    pub min_score: f64,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            exclude_same_collection: true,
            min_score: 0.0,
        }
    }
}

/// Default parameters of the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionSettings {
    /// Repositories retained
    pub top_n: usize,
    /// Edges kept per retained repository
    pub k: usize,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self { top_n: 150, k: 5 }
    }
}

/// Rebuild orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RebuildSettings {
    /// Per-extractor time limit
    pub extractor_timeout_secs: Option<u64>,
    /// Kinds to compute
    pub enabled_kinds: Vec<EdgeKind>,
}

impl Default for RebuildSettings {
    fn default() -> Self {
        Self {
            extractor_timeout_secs: Some(300),
            enabled_kinds: EdgeKind::ALL.to_vec(),
        }
    }
}

impl Settings {
    /// Reject settings that would break the weight or projection invariants
    pub fn validate(&self) -> Result<(), GraphError> {
        let unit = |name: &str, v: f64| {
            if v.is_finite() && (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(GraphError::validation(format!("{name} = {v} must lie in [0, 1]")))
            }
        };
        let non_negative = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(GraphError::validation(format!("{name} = {v} must be non-negative")))
            }
        };

        let ex = &self.extractors;
        non_negative("extractors.author.decay", ex.author.decay)?;
        unit("extractors.dependency.direct_weight", ex.dependency.direct_weight)?;
        unit("extractors.dependency.transitive_weight", ex.dependency.transitive_weight)?;
        unit("extractors.ecosystem.per_topic", ex.ecosystem.per_topic)?;
        unit("extractors.ecosystem.language_bonus", ex.ecosystem.language_bonus)?;
        unit("extractors.semantic.threshold", ex.semantic.threshold)?;
        if !(ex.collection.pivot.is_finite() && ex.collection.pivot > 0.0) {
            return Err(GraphError::validation("extractors.collection.pivot must be positive"));
        }

        for kind in EdgeKind::ALL {
            non_negative(&format!("fusion.weights.{kind}"), self.fusion.weights.coefficient(kind))?;
        }
        if self.fusion.weights.total() <= 0.0 {
            return Err(GraphError::validation("fusion weights must not all be zero"));
        }
        unit("fusion.min_score", self.fusion.min_score)?;

        if self.projection.top_n == 0 || self.projection.k == 0 {
            return Err(GraphError::validation("projection top_n and k must be positive"));
        }
        if self.rebuild.enabled_kinds.is_empty() {
            return Err(GraphError::validation("rebuild.enabled_kinds must not be empty"));
        }
        Ok(())
    }
}

/// Load configuration from an optional file and the environment
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("STARGRAPH")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;
    settings.validate()?;
    Ok(settings)
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Read-only view of the upstream repository corpus
//!
//! The corpus is produced by the ingestion pipeline (repository metadata,
//! parsed dependency manifests, user collections, embeddings) and written as
//! a single JSON document. The graph engine never mutates it.

use crate::error::{GraphError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

fn default_true() -> bool {
    true
}

/// One entry of a parsed dependency manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    /// Package name as written in the manifest
    pub package: String,
    /// Repository the package resolves to, when the manifest parser knew it
    #[serde(default)]
    pub repo: Option<String>,
    /// Direct (declared) or transitive (lockfile-only) dependency
    #[serde(default = "default_true")]
    pub direct: bool,
}

/// Repository metadata consumed by the extractors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Globally unique `owner/name`
    pub name_with_owner: String,
    /// Owner, derived from `name_with_owner` when absent
    #[serde(default)]
    pub owner: Option<String>,
    /// Primary language
    #[serde(default)]
    pub language: Option<String>,
    /// Declared topics
    #[serde(default)]
    pub topics: Vec<String>,
    /// Parsed dependency manifest
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
    /// Description/summary embedding
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Last upstream change to this repository's metadata
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last time the dependency manifest was parsed
    #[serde(default)]
    pub manifest_parsed_at: Option<DateTime<Utc>>,
}

impl Repository {
    /// Minimal repository with only its key set
    pub fn new(name_with_owner: impl Into<String>) -> Self {
        Self {
            name_with_owner: name_with_owner.into(),
            owner: None,
            language: None,
            topics: Vec::new(),
            dependencies: Vec::new(),
            embedding: None,
            updated_at: None,
            manifest_parsed_at: None,
        }
    }

    /// Set the primary language
    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Set the declared topics
    #[must_use]
    pub fn with_topics(mut self, topics: &[&str]) -> Self {
        self.topics = topics.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Add a dependency entry
    #[must_use]
    pub fn with_dependency(mut self, package: &str, repo: Option<&str>, direct: bool) -> Self {
        self.dependencies.push(DependencyRef {
            package: package.to_string(),
            repo: repo.map(String::from),
            direct,
        });
        self
    }

    /// Set the embedding vector
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set the upstream change timestamp
    #[must_use]
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Owner of the repository
    #[must_use]
    pub fn owner(&self) -> &str {
        match &self.owner {
            Some(owner) => owner,
            None => self
                .name_with_owner
                .split_once('/')
                .map_or(self.name_with_owner.as_str(), |(owner, _)| owner),
        }
    }

    /// Repository name without the owner
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name_with_owner
            .split_once('/')
            .map_or(self.name_with_owner.as_str(), |(_, name)| name)
    }
}

/// A user collection of repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Stable identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Member repositories
    #[serde(default)]
    pub members: Vec<String>,
}

impl Collection {
    /// Create a collection
    pub fn new(id: &str, members: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            members: members.iter().map(|m| (*m).to_string()).collect(),
        }
    }
}

/// On-disk shape of the corpus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusDocument {
    /// All starred repositories
    #[serde(default)]
    pub repositories: Vec<Repository>,
    /// User collections
    #[serde(default)]
    pub collections: Vec<Collection>,
}

/// Validated, indexed corpus
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    repos: BTreeMap<String, Repository>,
    collections: Vec<Collection>,
}

impl Corpus {
    /// Build a corpus from repositories and collections
    pub fn new(repositories: Vec<Repository>, collections: Vec<Collection>) -> Result<Self> {
        Self::from_document(CorpusDocument {
            repositories,
            collections,
        })
    }

    /// Validate and index a corpus document
    pub fn from_document(doc: CorpusDocument) -> Result<Self> {
        let mut repos = BTreeMap::new();
        for mut repo in doc.repositories {
            let key = repo.name_with_owner.trim().to_string();
            if key.is_empty() || !key.contains('/') {
                return Err(GraphError::validation(format!(
                    "repository key '{}' is not of the form owner/name",
                    repo.name_with_owner
                )));
            }
            if repos.contains_key(&key) {
                return Err(GraphError::validation(format!(
                    "duplicate repository '{key}' in corpus"
                )));
            }
            repo.name_with_owner.clone_from(&key);
            repos.insert(key, repo);
        }

        let mut collections = Vec::with_capacity(doc.collections.len());
        for mut collection in doc.collections {
            let before = collection.members.len();
            collection.members.retain(|m| repos.contains_key(m));
            collection.members.sort();
            collection.members.dedup();
            if collection.members.len() < before {
                warn!(
                    "Collection {} references {} unknown or duplicate repositories",
                    collection.id,
                    before - collection.members.len()
                );
            }
            collections.push(collection);
        }
        collections.sort_by(|a, b| a.id.cmp(&b.id));

        debug!(
            "Corpus indexed: {} repositories, {} collections",
            repos.len(),
            collections.len()
        );

        Ok(Self { repos, collections })
    }

    /// Load a corpus from a JSON file; a missing file is an empty corpus
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("No corpus at {}, using an empty one", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
        let doc: CorpusDocument = serde_json::from_str(&content)?;
        Self::from_document(doc)
    }

    /// Back to the on-disk shape
    #[must_use]
    pub fn to_document(&self) -> CorpusDocument {
        CorpusDocument {
            repositories: self.repos.values().cloned().collect(),
            collections: self.collections.clone(),
        }
    }

    /// Look up a repository
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Repository> {
        self.repos.get(id)
    }

    /// Whether a repository is part of the corpus
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.repos.contains_key(id)
    }

    /// Repositories in key order
    pub fn repos(&self) -> impl Iterator<Item = &Repository> {
        self.repos.values()
    }

    /// Repository keys in order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.repos.keys().map(String::as_str)
    }

    /// Number of repositories
    #[must_use]
    pub fn len(&self) -> usize {
        self.repos.len()
    }

    /// Whether the corpus has no repositories
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// All collections, ordered by id
    #[must_use]
    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// Repositories that share at least one collection with `repo`
    #[must_use]
    pub fn collection_peers(&self, repo: &str) -> BTreeSet<&str> {
        self.collections
            .iter()
            .filter(|c| c.members.iter().any(|m| m == repo))
            .flat_map(|c| c.members.iter().map(String::as_str))
            .filter(|m| *m != repo)
            .collect()
    }
}

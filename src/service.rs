// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Graph service - the operations exposed over one data directory

use crate::builder::{GraphBuilder, RebuildMode, RebuildReport};
use crate::config::Settings;
use crate::corpus::{Corpus, CorpusDocument};
use crate::error::{GraphError, Result, StaleCacheWarning};
use crate::extract::default_extractors;
use crate::projection::{CacheStatus, ProjectionCache, ProjectionParams, ProjectionSnapshot};
use crate::recommend::RecommendationFuser;
use crate::schema::{self, write_json_atomic, DataLayout};
use crate::status::StatusStore;
use crate::store::EdgeStore;
use crate::types::{Edge, EdgeKind, GraphStatus, Recommendation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Overall result of a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildStatus {
    /// Every kind succeeded
    Ok,
    /// Some kinds failed and kept their previous edges
    Partial,
}

/// Response of [`GraphService::rebuild`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildOutcome {
    /// `ok` or `partial`
    pub status: RebuildStatus,
    /// Edges in the store after the rebuild
    pub edges_count: usize,
    /// Per-kind detail
    pub report: RebuildReport,
}

/// Response of [`GraphService::projection`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionView {
    /// Served snapshot
    #[serde(flatten)]
    pub snapshot: ProjectionSnapshot,
    /// Whether the snapshot came from the cache
    pub cached: bool,
    /// Present when the snapshot predates the latest graph change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<StaleCacheWarning>,
}

/// Whole-graph summary for `stargraph status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    /// Schema version of the data directory
    pub schema_version: u32,
    /// Repositories in the corpus
    pub repositories: usize,
    /// Collections in the corpus
    pub collections: usize,
    /// Edge counts per kind
    pub edges: BTreeMap<EdgeKind, usize>,
    /// Total edges
    pub total_edges: usize,
    /// Repositories needing recomputation
    pub stale: Vec<String>,
    /// Projection cache state
    pub cache: CacheStatus,
}

/// Owns every component of one data directory
pub struct GraphService {
    layout: DataLayout,
    settings: Settings,
    corpus: Arc<Corpus>,
    store: Arc<EdgeStore>,
    status: Arc<StatusStore>,
    cache: Arc<ProjectionCache>,
    builder: GraphBuilder,
    fuser: RecommendationFuser,
}

impl GraphService {
    /// Open (and migrate) the data directory named by `settings`
    pub fn open(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let layout = DataLayout::new(&settings.data_dir);
        fs::create_dir_all(layout.root()).map_err(|e| GraphError::io(layout.root(), e))?;
        schema::ensure(&layout)?;

        let corpus = Arc::new(Corpus::load(&layout.corpus())?);
        let store = Arc::new(EdgeStore::load(&layout)?);
        let status = Arc::new(StatusStore::load(&layout)?);
        let cache = Arc::new(ProjectionCache::load(&layout)?);

        let enabled: BTreeSet<EdgeKind> = settings.rebuild.enabled_kinds.iter().copied().collect();
        let extractors = default_extractors(&settings.extractors)
            .into_iter()
            .filter(|e| enabled.contains(&e.kind()));
        let builder = GraphBuilder::new(Arc::clone(&store), Arc::clone(&status), Arc::clone(&cache))
            .with_extractors(extractors)
            .with_timeout(settings.rebuild.extractor_timeout_secs.map(Duration::from_secs));
        let fuser = RecommendationFuser::new(settings.fusion.clone());

        debug!(
            "Opened {}: {} repositories, {} edges",
            layout.root().display(),
            corpus.len(),
            store.len()
        );
        Ok(Self {
            layout,
            settings,
            corpus,
            store,
            status,
            cache,
            builder,
            fuser,
        })
    }

    /// Active settings
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Data directory layout
    #[must_use]
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Loaded corpus
    #[must_use]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Edge store
    #[must_use]
    pub fn store(&self) -> &EdgeStore {
        &self.store
    }

    /// Validate and persist a new corpus document
    pub fn import_corpus(&mut self, doc: CorpusDocument) -> Result<usize> {
        let corpus = Corpus::from_document(doc)?;
        write_json_atomic(&self.layout.corpus(), &corpus.to_document())?;
        info!(
            "Imported {} repositories and {} collections",
            corpus.len(),
            corpus.collections().len()
        );
        let count = corpus.len();
        self.corpus = Arc::new(corpus);
        Ok(count)
    }

    fn ensure_known(&self, repo: &str) -> Result<()> {
        if self.corpus.contains(repo) || self.store.contains_repo(repo) {
            Ok(())
        } else {
            Err(GraphError::NotFound(repo.to_string()))
        }
    }

    /// Edges incident to `repo`, optionally limited to `kinds`
    pub fn edges(&self, repo: &str, kinds: Option<&[EdgeKind]>) -> Result<Vec<Edge>> {
        self.ensure_known(repo)?;
        Ok(self.store.query(repo, kinds))
    }

    /// Recompute edges and persist the result
    pub async fn rebuild(&self, mode: RebuildMode) -> Result<RebuildOutcome> {
        let result = self.builder.rebuild(Arc::clone(&self.corpus), mode).await;
        // cascades are applied even when every kind failed
        self.save()?;
        let report = result?;
        let status = if report.is_partial() {
            RebuildStatus::Partial
        } else {
            RebuildStatus::Ok
        };
        Ok(RebuildOutcome {
            status,
            edges_count: self.store.len(),
            report,
        })
    }

    /// Incremental rebuild over stale and removed repositories
    pub async fn rebuild_stale(&self) -> Result<RebuildOutcome> {
        let mut repos: BTreeSet<String> = self.status.stale_repos(&self.corpus).into_iter().collect();
        repos.extend(
            self.status
                .all()
                .into_iter()
                .map(|row| row.repo_id)
                .filter(|id| !self.corpus.contains(id)),
        );
        info!("{} repositories need recomputation", repos.len());
        self.rebuild(RebuildMode::Incremental(repos)).await
    }

    /// Every status row
    #[must_use]
    pub fn status(&self) -> Vec<GraphStatus> {
        self.status.all()
    }

    /// Corpus repositories needing recomputation
    #[must_use]
    pub fn stale_repos(&self) -> Vec<String> {
        self.status.stale_repos(&self.corpus)
    }

    /// Whole-graph summary
    #[must_use]
    pub fn summary(&self) -> GraphSummary {
        let edges = self.store.count_by_kind();
        GraphSummary {
            schema_version: schema::SCHEMA_VERSION,
            repositories: self.corpus.len(),
            collections: self.corpus.collections().len(),
            total_edges: edges.values().sum(),
            edges,
            stale: self.stale_repos(),
            cache: self.cache.status(self.status.latest_computed_at()),
        }
    }

    /// Ranked recommendations for `repo`
    pub fn recommendations(&self, repo: &str, limit: Option<usize>) -> Result<Vec<Recommendation>> {
        self.ensure_known(repo)?;
        let edges = self.store.query(repo, None);
        let excluded = if self.fuser.excludes_same_collection() {
            self.corpus.collection_peers(repo)
        } else {
            BTreeSet::new()
        };
        Ok(self.fuser.fuse(repo, &edges, &excluded, limit))
    }

    /// The projection for `(top_n, k)`, recomputed on a parameter miss or
    /// when `refresh` is set
    pub fn projection(&self, top_n: Option<usize>, k: Option<usize>, refresh: bool) -> Result<ProjectionView> {
        let params = ProjectionParams {
            top_n: top_n.unwrap_or(self.settings.projection.top_n),
            k: k.unwrap_or(self.settings.projection.k),
        };
        if params.top_n == 0 || params.k == 0 {
            return Err(GraphError::validation("top_n and k must be positive"));
        }

        if !refresh {
            if let Some(snapshot) = self.cache.get(params) {
                let warning = self.cache.staleness(&snapshot, self.status.latest_computed_at());
                return Ok(ProjectionView {
                    snapshot: (*snapshot).clone(),
                    cached: true,
                    warning,
                });
            }
        }

        let snapshot = self.cache.rebuild(&self.store, params)?;
        Ok(ProjectionView {
            snapshot: (*snapshot).clone(),
            cached: false,
            warning: None,
        })
    }

    /// Cascade away every edge and the status row of `repo`
    pub fn delete_repo(&self, repo: &str) -> Result<usize> {
        let removed = self.store.delete_for_repo(repo);
        let had_status = self.status.remove(repo);
        if removed > 0 || had_status {
            self.cache.invalidate()?;
            self.save()?;
        }
        info!("Removed {removed} edges of {repo}");
        Ok(removed)
    }

    /// Persist the edge store and status table
    pub fn save(&self) -> Result<()> {
        self.store.save(&self.layout)?;
        self.status.save(&self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Collection, Repository};
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> GraphService {
        let settings = Settings {
            data_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        GraphService::open(settings).unwrap()
    }

    fn owners_doc() -> CorpusDocument {
        CorpusDocument {
            repositories: vec![Repository::new("A/x"), Repository::new("A/y"), Repository::new("B/z")],
            collections: vec![],
        }
    }

    #[tokio::test]
    async fn test_rebuild_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let mut service = open(&dir);
        service.import_corpus(owners_doc()).unwrap();

        let outcome = service.rebuild(RebuildMode::Full).await.unwrap();
        assert_eq!(outcome.status, RebuildStatus::Ok);
        assert_eq!(outcome.edges_count, 1);

        let reopened = open(&dir);
        assert_eq!(reopened.store().fingerprint(), service.store().fingerprint());
        assert_eq!(reopened.status().len(), 3);
        assert!(reopened.stale_repos().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_repo_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut service = open(&dir);
        service.import_corpus(owners_doc()).unwrap();

        assert!(matches!(service.edges("nobody/here", None), Err(GraphError::NotFound(_))));
        assert!(matches!(
            service.recommendations("nobody/here", None),
            Err(GraphError::NotFound(_))
        ));
        assert!(service.recommendations("B/z", None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_collection_candidates_excluded() {
        let dir = TempDir::new().unwrap();
        let mut service = open(&dir);
        let mut doc = owners_doc();
        doc.collections.push(Collection::new("saved", &["A/x", "A/y"]));
        service.import_corpus(doc).unwrap();
        service.rebuild(RebuildMode::Full).await.unwrap();

        assert!(service.recommendations("A/x", None).unwrap().is_empty());
        assert_eq!(service.edges("A/x", Some(&[EdgeKind::Collection])).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_projection_cache_hit_and_warning() {
        let dir = TempDir::new().unwrap();
        let mut service = open(&dir);
        service.import_corpus(owners_doc()).unwrap();
        service.rebuild(RebuildMode::Full).await.unwrap();

        let first = service.projection(Some(10), Some(2), false).unwrap();
        assert!(!first.cached);
        let second = service.projection(Some(10), Some(2), false).unwrap();
        assert!(second.cached);
        assert!(second.warning.is_none());

        service.rebuild(RebuildMode::Full).await.unwrap();
        let stale = service.projection(Some(10), Some(2), false).unwrap();
        assert!(stale.cached);
        assert!(stale.warning.is_some());

        assert!(service.projection(Some(0), None, false).unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_opens_v1_directory_with_legacy_cache() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        write_json_atomic(
            &layout.schema(),
            &schema::SchemaMarker { version: 1, migrated_at: chrono::Utc::now() },
        )
        .unwrap();
        write_json_atomic(
            &layout.network_cache(),
            &serde_json::json!({ "nodes": [], "edges": [], "top_n": 50, "k": 3 }),
        )
        .unwrap();

        let mut service = open(&dir);
        service.import_corpus(owners_doc()).unwrap();
        service.rebuild(RebuildMode::Full).await.unwrap();

        let view = service.projection(Some(50), Some(3), false).unwrap();
        assert!(!view.cached);
        assert_eq!(view.snapshot.nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_repo_cascades() {
        let dir = TempDir::new().unwrap();
        let mut service = open(&dir);
        service.import_corpus(owners_doc()).unwrap();
        service.rebuild(RebuildMode::Full).await.unwrap();

        assert_eq!(service.delete_repo("A/y").unwrap(), 1);
        assert!(service.store().is_empty());
        assert_eq!(service.status().len(), 2);
        assert_eq!(service.stale_repos(), vec!["A/y"]);
    }
}

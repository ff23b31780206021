// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Graph builder - runs the extractors and merges their output
//!
//! Extractors run concurrently on the blocking pool. Each kind is written to
//! the edge store as one atomic replacement, so a failing or interrupted
//! kind never disturbs the edges of another.

use crate::corpus::Corpus;
use crate::error::{GraphError, PartialRebuildFailure, Result};
use crate::extract::{Scope, SignalExtractor};
use crate::projection::ProjectionCache;
use crate::status::StatusStore;
use crate::store::EdgeStore;
use crate::types::{Edge, EdgeDraft, EdgeKind};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a rebuild recomputes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildMode {
    /// Every kind over the whole corpus
    Full,
    /// Only edges incident to these repositories
    Incremental(BTreeSet<String>),
}

impl RebuildMode {
    /// Incremental mode over `repos`
    pub fn incremental<I, S>(repos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Incremental(repos.into_iter().map(Into::into).collect())
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental(_) => "incremental",
        }
    }
}

/// Outcome of a rebuild that wrote at least one kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildReport {
    /// `full` or `incremental`
    pub mode: String,
    /// Edges written per succeeded kind
    pub written: BTreeMap<EdgeKind, usize>,
    /// Kinds that failed, with detail
    pub failures: PartialRebuildFailure,
    /// Repositories whose status was stamped (zero when some kind failed)
    pub repos_touched: usize,
    /// Repositories whose edges were cascaded away
    pub removed_repos: Vec<String>,
    /// Wall-clock duration
    pub elapsed_ms: u64,
}

impl RebuildReport {
    /// Total edges written across kinds
    #[must_use]
    pub fn edges_written(&self) -> usize {
        self.written.values().sum()
    }

    /// Whether some kinds failed
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

enum KindOutcome {
    Drafts(Vec<EdgeDraft>),
    Failed(String),
}

/// Orchestrates the extractors over one edge store
pub struct GraphBuilder {
    extractors: Vec<Arc<dyn SignalExtractor>>,
    store: Arc<EdgeStore>,
    status: Arc<StatusStore>,
    cache: Arc<ProjectionCache>,
    timeout: Option<Duration>,
}

impl GraphBuilder {
    /// Builder with no extractors registered
    #[must_use]
    pub fn new(store: Arc<EdgeStore>, status: Arc<StatusStore>, cache: Arc<ProjectionCache>) -> Self {
        Self {
            extractors: Vec::new(),
            store,
            status,
            cache,
            timeout: None,
        }
    }

    /// Register extractors
    #[must_use]
    pub fn with_extractors(mut self, extractors: impl IntoIterator<Item = Arc<dyn SignalExtractor>>) -> Self {
        self.extractors.extend(extractors);
        self
    }

    /// Bound each extractor's run time
    ///
    /// Every extractor shares one deadline taken when they are spawned. A
    /// kind that misses it is reported as failed, but its blocking thread
    /// cannot be cancelled and keeps running until the extractor returns;
    /// its output is then discarded.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Kinds this builder computes
    #[must_use]
    pub fn kinds(&self) -> Vec<EdgeKind> {
        self.extractors.iter().map(|e| e.kind()).collect()
    }

    /// Recompute edges for `mode`
    ///
    /// Fails only when no kind could be written.
    pub async fn rebuild(&self, corpus: Arc<Corpus>, mode: RebuildMode) -> Result<RebuildReport> {
        let started = Instant::now();
        self.check_extractors()?;

        let mut removed_repos = Vec::new();
        let (scope, touched): (Scope, BTreeSet<String>) = match &mode {
            RebuildMode::Full => (Scope::All, corpus.ids().map(String::from).collect()),
            RebuildMode::Incremental(repos) => {
                let (present, removed): (BTreeSet<String>, BTreeSet<String>) =
                    repos.iter().cloned().partition(|r| corpus.contains(r));
                for repo in removed {
                    let dropped = self.store.delete_for_repo(&repo);
                    self.status.remove(&repo);
                    debug!("Cascaded {dropped} edges of removed repository {repo}");
                    removed_repos.push(repo);
                }
                (Scope::Repos(present.clone()), present)
            }
        };

        if matches!(mode, RebuildMode::Incremental(_)) && touched.is_empty() {
            if !removed_repos.is_empty() {
                self.cache.invalidate()?;
            }
            return Ok(RebuildReport {
                mode: mode.label().to_string(),
                written: BTreeMap::new(),
                failures: PartialRebuildFailure::default(),
                repos_touched: 0,
                removed_repos,
                elapsed_ms: elapsed_ms(started),
            });
        }

        info!(
            "Starting {} rebuild over {} repositories ({} kinds)",
            mode.label(),
            touched.len(),
            self.extractors.len()
        );

        let scope = Arc::new(scope);
        let deadline = self.timeout.map(|limit| tokio::time::Instant::now() + limit);
        let handles: Vec<(EdgeKind, JoinHandle<Result<Vec<EdgeDraft>>>)> = self
            .extractors
            .iter()
            .map(|extractor| {
                let extractor = Arc::clone(extractor);
                let corpus = Arc::clone(&corpus);
                let scope = Arc::clone(&scope);
                let kind = extractor.kind();
                (kind, tokio::task::spawn_blocking(move || extractor.extract(&corpus, &scope)))
            })
            .collect();

        let mut written = BTreeMap::new();
        let mut failures = PartialRebuildFailure::default();
        for (kind, handle) in handles {
            let outcome = self.await_kind(handle, deadline).await;
            let result = match outcome {
                KindOutcome::Drafts(drafts) => self.write_kind(kind, &scope, drafts),
                KindOutcome::Failed(message) => Err(GraphError::Extractor { kind, message }),
            };
            match result {
                Ok(count) => {
                    info!("{kind}: {count} edges");
                    written.insert(kind, count);
                }
                Err(e) => {
                    warn!("{kind} extractor failed, keeping previous {kind} edges: {e}");
                    failures.push(kind, e);
                }
            }
        }

        if written.is_empty() {
            return Err(GraphError::NoKindSucceeded(failures));
        }

        if mode == RebuildMode::Full {
            self.status.retain_known(&corpus);
            for repo in self.store.repos() {
                if !corpus.contains(&repo) {
                    self.store.delete_for_repo(&repo);
                    removed_repos.push(repo);
                }
            }
        }

        // a partial rebuild leaves the failed kinds stale, so status stays put
        let repos_touched = if failures.is_empty() {
            self.status
                .mark_computed(touched.iter().map(String::as_str), &corpus, Utc::now())
        } else {
            warn!(
                "{} kinds failed; {} repositories stay stale",
                failures.failures.len(),
                touched.len()
            );
            0
        };
        self.cache.invalidate()?;

        let report = RebuildReport {
            mode: mode.label().to_string(),
            written,
            failures,
            repos_touched,
            removed_repos,
            elapsed_ms: elapsed_ms(started),
        };
        info!(
            "Rebuild finished: {} edges written, {} kinds failed, {} ms",
            report.edges_written(),
            report.failures.failures.len(),
            report.elapsed_ms
        );
        Ok(report)
    }

    fn check_extractors(&self) -> Result<()> {
        if self.extractors.is_empty() {
            return Err(GraphError::validation("no extractors registered"));
        }
        let mut seen = BTreeSet::new();
        for kind in self.kinds() {
            if !seen.insert(kind) {
                return Err(GraphError::validation(format!(
                    "more than one extractor registered for {kind}"
                )));
            }
        }
        Ok(())
    }

    async fn await_kind(
        &self,
        handle: JoinHandle<Result<Vec<EdgeDraft>>>,
        deadline: Option<tokio::time::Instant>,
    ) -> KindOutcome {
        let joined = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    let limit = self.timeout.unwrap_or_default();
                    return KindOutcome::Failed(format!("timed out after {}s", limit.as_secs_f64()));
                }
            },
            None => handle.await,
        };
        match joined {
            Ok(Ok(drafts)) => KindOutcome::Drafts(drafts),
            Ok(Err(e)) => KindOutcome::Failed(e.to_string()),
            Err(e) if e.is_panic() => KindOutcome::Failed("extractor panicked".to_string()),
            Err(e) => KindOutcome::Failed(e.to_string()),
        }
    }

    fn write_kind(&self, kind: EdgeKind, scope: &Scope, drafts: Vec<EdgeDraft>) -> Result<usize> {
        let edges = drafts
            .into_iter()
            .map(|d| d.into_edge(kind))
            .collect::<Result<Vec<Edge>>>()?;
        match scope {
            Scope::All => self.store.replace_kind(kind, edges),
            Scope::Repos(repos) => self.store.replace_incident(kind, repos, edges),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorSettings;
    use crate::corpus::Repository;
    use crate::extract::default_extractors;
    use crate::extract::test_support::sample_corpus;

    struct Failing(EdgeKind);

    impl SignalExtractor for Failing {
        fn kind(&self) -> EdgeKind {
            self.0
        }

        fn extract(&self, _corpus: &Corpus, _scope: &Scope) -> Result<Vec<EdgeDraft>> {
            Err(GraphError::Extractor {
                kind: self.0,
                message: "manifest service unavailable".into(),
            })
        }
    }

    struct OutOfRange;

    impl SignalExtractor for OutOfRange {
        fn kind(&self) -> EdgeKind {
            EdgeKind::Collection
        }

        fn extract(&self, corpus: &Corpus, _scope: &Scope) -> Result<Vec<EdgeDraft>> {
            let ids: Vec<&str> = corpus.ids().take(2).collect();
            Ok(vec![EdgeDraft::new(ids[0], ids[1], 1.5, serde_json::Value::Null)])
        }
    }

    struct Panicking(EdgeKind);

    impl SignalExtractor for Panicking {
        fn kind(&self) -> EdgeKind {
            self.0
        }

        fn extract(&self, _corpus: &Corpus, _scope: &Scope) -> Result<Vec<EdgeDraft>> {
            panic!("ecosystem index corrupted");
        }
    }

    struct Sleeping(EdgeKind, Duration);

    impl SignalExtractor for Sleeping {
        fn kind(&self) -> EdgeKind {
            self.0
        }

        fn extract(&self, _corpus: &Corpus, _scope: &Scope) -> Result<Vec<EdgeDraft>> {
            std::thread::sleep(self.1);
            Ok(Vec::new())
        }
    }

    fn builder(extractors: Vec<Arc<dyn SignalExtractor>>) -> GraphBuilder {
        GraphBuilder::new(
            Arc::new(EdgeStore::new()),
            Arc::new(StatusStore::new()),
            Arc::new(ProjectionCache::new()),
        )
        .with_extractors(extractors)
    }

    #[tokio::test]
    async fn test_full_rebuild_writes_every_kind() {
        let corpus = Arc::new(sample_corpus());
        let b = builder(default_extractors(&ExtractorSettings::default()));

        let report = b.rebuild(Arc::clone(&corpus), RebuildMode::Full).await.unwrap();
        assert!(!report.is_partial());
        assert_eq!(report.repos_touched, corpus.len());
        assert_eq!(report.edges_written(), b.store.len());
        assert!(b.status.stale_repos(&corpus).is_empty());
        assert!(b.cache.is_invalidated());
    }

    #[tokio::test]
    async fn test_failing_kind_keeps_previous_edges() {
        let corpus = Arc::new(sample_corpus());
        let good = builder(default_extractors(&ExtractorSettings::default()));
        good.rebuild(Arc::clone(&corpus), RebuildMode::Full).await.unwrap();
        let deps_before = good.store.count_by_kind()[&EdgeKind::Dependency];

        let mixed = GraphBuilder::new(
            Arc::clone(&good.store),
            Arc::clone(&good.status),
            Arc::clone(&good.cache),
        )
        .with_extractors(vec![
            Arc::new(Failing(EdgeKind::Dependency)) as Arc<dyn SignalExtractor>,
            Arc::new(OutOfRange),
            Arc::new(crate::extract::AuthorExtractor::default()),
        ]);

        let report = mixed.rebuild(corpus, RebuildMode::Full).await.unwrap();
        assert!(report.is_partial());
        assert_eq!(report.failures.kinds(), vec![EdgeKind::Dependency, EdgeKind::Collection]);
        assert!(report.written.contains_key(&EdgeKind::Author));
        assert_eq!(mixed.store.count_by_kind()[&EdgeKind::Dependency], deps_before);
    }

    #[tokio::test]
    async fn test_partial_rebuild_leaves_status_stale() {
        let corpus = Arc::new(sample_corpus());
        let b = builder(vec![
            Arc::new(Failing(EdgeKind::Dependency)) as Arc<dyn SignalExtractor>,
            Arc::new(crate::extract::AuthorExtractor::default()),
        ]);

        let report = b.rebuild(Arc::clone(&corpus), RebuildMode::Full).await.unwrap();
        assert!(report.is_partial());
        assert_eq!(report.repos_touched, 0);
        assert_eq!(b.status.stale_repos(&corpus).len(), corpus.len());
        assert!(b.cache.is_invalidated());
    }

    #[tokio::test]
    async fn test_panicking_kind_is_isolated() {
        let b = builder(vec![
            Arc::new(Panicking(EdgeKind::Ecosystem)) as Arc<dyn SignalExtractor>,
            Arc::new(crate::extract::AuthorExtractor::default()),
        ]);

        let report = b.rebuild(Arc::new(sample_corpus()), RebuildMode::Full).await.unwrap();
        assert_eq!(report.failures.kinds(), vec![EdgeKind::Ecosystem]);
        assert!(report.failures.failures[0].error.contains("extractor panicked"));
        assert!(report.written.contains_key(&EdgeKind::Author));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_slow_kinds_share_one_deadline() {
        let slow = Duration::from_millis(400);
        let b = builder(vec![
            Arc::new(Sleeping(EdgeKind::Semantic, slow)) as Arc<dyn SignalExtractor>,
            Arc::new(Sleeping(EdgeKind::Collection, slow)),
            Arc::new(crate::extract::AuthorExtractor::default()),
        ])
        .with_timeout(Some(Duration::from_millis(100)));

        let started = Instant::now();
        let report = b.rebuild(Arc::new(sample_corpus()), RebuildMode::Full).await.unwrap();
        assert!(started.elapsed() < slow);

        assert_eq!(report.failures.kinds(), vec![EdgeKind::Semantic, EdgeKind::Collection]);
        for failure in &report.failures.failures {
            assert!(failure.error.contains("timed out"), "{}", failure.error);
        }
        assert!(report.written.contains_key(&EdgeKind::Author));
    }

    #[tokio::test]
    async fn test_all_kinds_failing_is_an_error() {
        let b = builder(vec![
            Arc::new(Failing(EdgeKind::Author)) as Arc<dyn SignalExtractor>,
            Arc::new(Failing(EdgeKind::Semantic)),
        ]);
        let err = b.rebuild(Arc::new(sample_corpus()), RebuildMode::Full).await.unwrap_err();
        match err {
            GraphError::NoKindSucceeded(failure) => assert_eq!(failure.failures.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(b.status.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_kinds_rejected() {
        let b = builder(vec![
            Arc::new(crate::extract::AuthorExtractor::default()) as Arc<dyn SignalExtractor>,
            Arc::new(crate::extract::AuthorExtractor::default()),
        ]);
        let err = b.rebuild(Arc::new(sample_corpus()), RebuildMode::Full).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_incremental_cascades_removed_repositories() {
        let corpus = Arc::new(sample_corpus());
        let b = builder(default_extractors(&ExtractorSettings::default()));
        b.rebuild(Arc::clone(&corpus), RebuildMode::Full).await.unwrap();

        let mut doc = corpus.to_document();
        doc.repositories.retain(|r| r.name_with_owner != "tokio-rs/tracing");
        doc.repositories.push(Repository::new("tokio-rs/mio").with_topics(&["async"]));
        let next = Arc::new(Corpus::from_document(doc).unwrap());

        let report = b
            .rebuild(next, RebuildMode::incremental(["tokio-rs/tracing", "tokio-rs/mio"]))
            .await
            .unwrap();
        assert_eq!(report.removed_repos, vec!["tokio-rs/tracing"]);
        assert_eq!(report.repos_touched, 1);
        assert!(!b.store.contains_repo("tokio-rs/tracing"));
        assert!(b.store.contains_repo("tokio-rs/mio"));
        assert!(b.status.get("tokio-rs/tracing").is_none());
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Invariant tests for the stargraph engine
//!
//! These tests verify critical invariants:
//! 1. Weight bounds - nothing outside [0, 1] is ever stored
//! 2. Rebuild determinism - unchanged input yields an identical store
//! 3. Incremental isolation - scoped rebuilds never touch other edges
//! 4. Projection bounds - bounded, closed and deterministic
//! 5. Fusion - multi-source candidates rank at least as high as each source

use chrono::{Duration, Utc};
use proptest::prelude::*;
use stargraph::builder::RebuildMode;
use stargraph::config::{FusionSettings, Settings};
use stargraph::corpus::{Collection, CorpusDocument, Repository};
use stargraph::projection::{ProjectionParams, ProjectionSnapshot};
use stargraph::recommend::RecommendationFuser;
use stargraph::service::{GraphService, RebuildStatus};
use stargraph::store::EdgeStore;
use stargraph::types::{Edge, EdgeKind};
use std::collections::BTreeSet;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn make_service(dir: &TempDir) -> GraphService {
    let settings = Settings {
        data_dir: dir.path().to_path_buf(),
        ..Settings::default()
    };
    GraphService::open(settings).unwrap()
}

fn make_repo(name: &str, language: &str, topics: &[&str]) -> Repository {
    Repository::new(name).with_language(language).with_topics(topics)
}

fn make_doc(repositories: Vec<Repository>) -> CorpusDocument {
    CorpusDocument {
        repositories,
        collections: vec![],
    }
}

fn ecosystem_doc(three_topics: &[&str]) -> CorpusDocument {
    make_doc(vec![
        make_repo("a/one", "Rust", &["cli", "parser"]),
        make_repo("a/two", "Rust", &["cli"]),
        make_repo("b/three", "Go", three_topics),
        make_repo("c/four", "Go", &["net"]),
        make_repo("c/five", "Go", &["net", "cli"]),
    ])
}

fn make_edge(a: &str, b: &str, kind: EdgeKind, weight: f64) -> Edge {
    Edge::new(a, b, kind, weight, serde_json::json!({})).unwrap()
}

// =============================================================================
// Weight Bounds
// =============================================================================

#[test]
fn test_out_of_range_weight_is_rejected() {
    let store = EdgeStore::new();
    let mut edge = make_edge("a/x", "a/y", EdgeKind::Author, 0.5);
    edge.weight = 1.5;

    let err = store.upsert(vec![edge]).unwrap_err();
    assert!(err.is_validation());
    assert!(store.is_empty());
}

proptest! {
    #[test]
    fn prop_edge_weight_validation(weight in -2.0f64..3.0) {
        let result = Edge::new("a/x", "b/y", EdgeKind::Semantic, weight, serde_json::Value::Null);
        prop_assert_eq!(result.is_ok(), (0.0..=1.0).contains(&weight));
    }
}

// =============================================================================
// Rebuild Determinism and Isolation
// =============================================================================

#[tokio::test]
async fn test_full_rebuild_twice_is_identical() {
    let dir = TempDir::new().unwrap();
    let mut service = make_service(&dir);
    service.import_corpus(ecosystem_doc(&["parser"])).unwrap();

    service.rebuild(RebuildMode::Full).await.unwrap();
    let first = service.store().all();
    let fingerprint = service.store().fingerprint();

    service.rebuild(RebuildMode::Full).await.unwrap();
    assert_eq!(service.store().fingerprint(), fingerprint);
    assert_eq!(service.store().all(), first, "timestamps must not move");
}

#[tokio::test]
async fn test_incremental_rebuild_touches_only_incident_edges() {
    let dir = TempDir::new().unwrap();
    let mut service = make_service(&dir);
    service.import_corpus(ecosystem_doc(&["parser"])).unwrap();
    service.rebuild(RebuildMode::Full).await.unwrap();

    let untouched: Vec<Edge> = service
        .store()
        .all()
        .into_iter()
        .filter(|e| !e.touches("b/three"))
        .collect();

    service.import_corpus(ecosystem_doc(&["net"])).unwrap();
    service
        .rebuild(RebuildMode::incremental(["b/three"]))
        .await
        .unwrap();

    let after: Vec<Edge> = service
        .store()
        .all()
        .into_iter()
        .filter(|e| !e.touches("b/three"))
        .collect();
    assert_eq!(after, untouched);

    // same content as recomputing everything from the new corpus
    let fresh_dir = TempDir::new().unwrap();
    let mut fresh = make_service(&fresh_dir);
    fresh.import_corpus(ecosystem_doc(&["net"])).unwrap();
    fresh.rebuild(RebuildMode::Full).await.unwrap();
    assert_eq!(service.store().fingerprint(), fresh.store().fingerprint());
}

#[tokio::test]
async fn test_failed_kind_does_not_block_the_others() {
    let dir = TempDir::new().unwrap();
    let mut service = make_service(&dir);
    service
        .import_corpus(make_doc(vec![
            Repository::new("A/x").with_embedding(vec![1.0, 0.0]),
            Repository::new("A/y").with_embedding(vec![1.0, 0.0, 0.0]),
        ]))
        .unwrap();

    let outcome = service.rebuild(RebuildMode::Full).await.unwrap();
    assert_eq!(outcome.status, RebuildStatus::Partial);
    assert_eq!(outcome.report.failures.kinds(), vec![EdgeKind::Semantic]);
    assert_eq!(outcome.edges_count, 1);
    assert_eq!(outcome.report.repos_touched, 0);
    assert_eq!(service.stale_repos(), vec!["A/x", "A/y"]);
}

#[tokio::test]
async fn test_stale_repositories_are_rebuilt() {
    let dir = TempDir::new().unwrap();
    let mut service = make_service(&dir);
    service.import_corpus(ecosystem_doc(&["parser"])).unwrap();
    service.rebuild(RebuildMode::Full).await.unwrap();
    assert!(service.stale_repos().is_empty());

    let mut doc = ecosystem_doc(&["parser"]);
    doc.repositories[3] = make_repo("c/four", "Go", &["net", "parser"])
        .with_updated_at(Utc::now() + Duration::hours(1));
    doc.repositories.remove(1);
    service.import_corpus(doc).unwrap();
    assert_eq!(service.stale_repos(), vec!["c/four"]);

    let outcome = service.rebuild_stale().await.unwrap();
    assert_eq!(outcome.report.removed_repos, vec!["a/two"]);
    assert!(!service.store().contains_repo("a/two"));
    assert!(service
        .edges("c/four", Some(&[EdgeKind::Ecosystem]))
        .unwrap()
        .iter()
        .any(|e| e.touches("b/three")));
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_same_owner_scenario() {
    let dir = TempDir::new().unwrap();
    let mut service = make_service(&dir);
    service
        .import_corpus(make_doc(vec![
            Repository::new("A/x"),
            Repository::new("A/y"),
            Repository::new("B/z"),
        ]))
        .unwrap();
    service.rebuild(RebuildMode::Full).await.unwrap();

    let recs = service.recommendations("A/x", None).unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].name_with_owner, "A/y");
    assert_eq!(recs[0].sources, vec![EdgeKind::Author]);

    assert!(service.recommendations("B/z", None).unwrap().is_empty());
}

#[test]
fn test_projection_triangle_scenario() {
    let edges = vec![
        make_edge("A/a", "B/b", EdgeKind::Semantic, 0.9),
        make_edge("B/b", "C/c", EdgeKind::Semantic, 0.5),
        make_edge("A/a", "C/c", EdgeKind::Semantic, 0.3),
    ];
    let snap = ProjectionSnapshot::compute(&edges, ProjectionParams { top_n: 2, k: 1 });

    let ids: BTreeSet<&str> = snap.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["A/a", "B/b"].into());
    assert_eq!(snap.edges.len(), 1);
    assert!((snap.edges[0].weight - 0.9).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_collection_peers_are_not_recommended() {
    let dir = TempDir::new().unwrap();
    let mut service = make_service(&dir);
    service
        .import_corpus(CorpusDocument {
            repositories: vec![
                make_repo("x/web", "Rust", &["http"]),
                make_repo("y/server", "Rust", &["http"]),
                make_repo("z/client", "Rust", &["http"]),
            ],
            collections: vec![Collection::new("saved", &["x/web", "y/server"])],
        })
        .unwrap();
    service.rebuild(RebuildMode::Full).await.unwrap();

    let names: Vec<String> = service
        .recommendations("x/web", None)
        .unwrap()
        .into_iter()
        .map(|r| r.name_with_owner)
        .collect();
    assert_eq!(names, vec!["z/client"]);
}

// =============================================================================
// Projection and Fusion Properties
// =============================================================================

fn arb_edges() -> impl Strategy<Value = Vec<Edge>> {
    prop::collection::btree_map((0usize..8, 0usize..8, 0usize..5), 0.0f64..=1.0, 0..30).prop_map(|raw| {
        let mut seen = BTreeSet::new();
        raw.into_iter()
            .filter(|((a, b, _), _)| a != b)
            .filter_map(|((a, b, k), w)| {
                let edge = make_edge(&format!("o/r{a}"), &format!("o/r{b}"), EdgeKind::ALL[k], w);
                seen.insert(edge.key()).then_some(edge)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_projection_is_bounded_and_closed(edges in arb_edges(), top_n in 1usize..6, k in 1usize..4) {
        let snap = ProjectionSnapshot::compute(&edges, ProjectionParams { top_n, k });
        prop_assert!(snap.nodes.len() <= top_n);

        let ids: BTreeSet<&str> = snap.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &snap.edges {
            prop_assert!(ids.contains(edge.source.as_str()));
            prop_assert!(ids.contains(edge.target.as_str()));
        }

        let again = ProjectionSnapshot::compute(&edges, ProjectionParams { top_n, k });
        prop_assert_eq!(&again.nodes, &snap.nodes);
        prop_assert_eq!(&again.edges, &snap.edges);
    }

    #[test]
    fn prop_fused_scores_stay_in_unit_range(edges in arb_edges()) {
        let fuser = RecommendationFuser::new(FusionSettings::default());
        let recs = fuser.fuse("o/r0", &edges, &BTreeSet::new(), None);
        for rec in &recs {
            prop_assert!((0.0..=1.0).contains(&rec.final_score));
            prop_assert!(!rec.sources.is_empty());
        }
        for pair in recs.windows(2) {
            prop_assert!(pair[0].final_score >= pair[1].final_score);
        }
    }
}

#[test]
fn test_author_and_ecosystem_fuse_above_each_alone() {
    let fuser = RecommendationFuser::new(FusionSettings::default());
    let author = make_edge("q/q", "c/c", EdgeKind::Author, 0.7);
    let ecosystem = make_edge("q/q", "c/c", EdgeKind::Ecosystem, 0.45);

    let both = fuser.fuse("q/q", &[author.clone(), ecosystem.clone()], &BTreeSet::new(), None);
    assert_eq!(both[0].sources, vec![EdgeKind::Author, EdgeKind::Ecosystem]);
    for alone in [author, ecosystem] {
        let single = fuser.fuse("q/q", &[alone], &BTreeSet::new(), None);
        assert!(both[0].final_score >= single[0].final_score);
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `dependency` edges: dependent -> dependency, from parsed manifests

use super::{round_weight, Scope, SignalExtractor};
use crate::config::DependencySettings;
use crate::corpus::{Corpus, DependencyRef};
use crate::error::Result;
use crate::types::{EdgeDraft, EdgeKind};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Manifest extractor
#[derive(Debug, Clone, Default)]
pub struct DependencyExtractor {
    settings: DependencySettings,
}

#[derive(Debug, Default)]
struct Resolved {
    weight: f64,
    direct: bool,
    packages: BTreeSet<String>,
}

impl DependencyExtractor {
    /// Create with the given direct/transitive weights
    #[must_use]
    pub fn new(settings: DependencySettings) -> Self {
        Self { settings }
    }

    fn resolve<'c>(
        corpus: &'c Corpus,
        by_short_name: &BTreeMap<String, Vec<&'c str>>,
        dep: &DependencyRef,
    ) -> Option<&'c str> {
        if let Some(repo) = &dep.repo {
            return corpus.get(repo).map(|r| r.name_with_owner.as_str());
        }
        match by_short_name.get(&dep.package.to_lowercase()).map(Vec::as_slice) {
            Some([only]) => Some(*only),
            Some(many) if many.len() > 1 => {
                trace!("Package {} is ambiguous across {} repositories", dep.package, many.len());
                None
            }
            _ => None,
        }
    }
}

impl SignalExtractor for DependencyExtractor {
    fn kind(&self) -> EdgeKind {
        EdgeKind::Dependency
    }

    fn extract(&self, corpus: &Corpus, scope: &Scope) -> Result<Vec<EdgeDraft>> {
        let mut by_short_name: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for repo in corpus.repos() {
            by_short_name
                .entry(repo.short_name().to_lowercase())
                .or_default()
                .push(&repo.name_with_owner);
        }

        let mut resolved: BTreeMap<(String, String), Resolved> = BTreeMap::new();
        for repo in corpus.repos() {
            let source = repo.name_with_owner.as_str();
            for dep in &repo.dependencies {
                let Some(target) = Self::resolve(corpus, &by_short_name, dep) else {
                    continue;
                };
                if target == source || !scope.covers_pair(source, target) {
                    continue;
                }
                let weight = if dep.direct {
                    self.settings.direct_weight
                } else {
                    self.settings.transitive_weight
                };
                let entry = resolved
                    .entry((source.to_string(), target.to_string()))
                    .or_default();
                entry.weight = entry.weight.max(weight);
                entry.direct |= dep.direct;
                entry.packages.insert(dep.package.clone());
            }
        }

        Ok(resolved
            .into_iter()
            .map(|((source, target), r)| {
                EdgeDraft::new(
                    source,
                    target,
                    round_weight(r.weight),
                    json!({ "packages": r.packages, "direct": r.direct }),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Repository;
    use crate::extract::test_support::sample_corpus;

    #[test]
    fn test_resolves_by_repo_and_by_package_name() {
        let drafts = DependencyExtractor::default()
            .extract(&sample_corpus(), &Scope::All)
            .unwrap();
        let pairs: Vec<(&str, &str)> = drafts
            .iter()
            .map(|d| (d.source.as_str(), d.target.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("hyperium/hyper", "tokio-rs/tokio"),
                ("tokio-rs/axum", "hyperium/hyper"),
                ("tokio-rs/axum", "tokio-rs/tokio"),
            ]
        );
    }

    #[test]
    fn test_transitive_weight_and_merge() {
        let corpus = Corpus::new(
            vec![
                Repository::new("a/app")
                    .with_dependency("lib", None, false)
                    .with_dependency("lib-core", Some("b/lib"), false),
                Repository::new("b/lib"),
                Repository::new("c/cli").with_dependency("lib", None, false).with_dependency("lib", None, true),
            ],
            vec![],
        )
        .unwrap();
        let drafts = DependencyExtractor::default().extract(&corpus, &Scope::All).unwrap();

        let app = drafts.iter().find(|d| d.source == "a/app").unwrap();
        assert!((app.weight - 0.5).abs() < f64::EPSILON);
        assert_eq!(app.metadata["packages"], json!(["lib", "lib-core"]));
        assert_eq!(app.metadata["direct"], false);

        let cli = drafts.iter().find(|d| d.source == "c/cli").unwrap();
        assert!((cli.weight - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_skips_ambiguous_external_and_self() {
        let corpus = Corpus::new(
            vec![
                Repository::new("a/core").with_dependency("core", None, true),
                Repository::new("b/core"),
                Repository::new("c/app")
                    .with_dependency("core", None, true)
                    .with_dependency("left-pad", Some("npm/left-pad"), true),
                Repository::new("d/self").with_dependency("x", Some("d/self"), true),
            ],
            vec![],
        )
        .unwrap();

        let drafts = DependencyExtractor::default().extract(&corpus, &Scope::All).unwrap();
        assert!(drafts.is_empty());
    }

    #[test]
    fn test_scope_includes_incoming_edges() {
        let scope = Scope::Repos(["tokio-rs/tokio".to_string()].into());
        let drafts = DependencyExtractor::default().extract(&sample_corpus(), &scope).unwrap();

        assert_eq!(drafts.len(), 2);
        assert!(drafts.iter().all(|d| d.target == "tokio-rs/tokio"));
    }
}

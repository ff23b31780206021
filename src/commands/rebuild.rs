// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Rebuild command - recompute edges from the corpus

use super::Global;
use crate::builder::RebuildMode;
use crate::service::RebuildStatus;
use anyhow::{Context, Result};

/// Run the rebuild command
///
/// With no repositories and no `--stale`, every kind is recomputed over the
/// whole corpus.
pub async fn run(global: &Global, repos: Vec<String>, stale: bool) -> Result<()> {
    let service = global.open()?;

    let result = if stale {
        service.rebuild_stale().await
    } else if repos.is_empty() {
        service.rebuild(RebuildMode::Full).await
    } else {
        service.rebuild(RebuildMode::incremental(repos)).await
    };
    let outcome = result.context("Rebuild failed")?;

    if global.json {
        return global.print_json(&outcome);
    }

    let report = &outcome.report;
    let label = match outcome.status {
        RebuildStatus::Ok => "ok",
        RebuildStatus::Partial => "partial",
    };
    println!(
        "Rebuild {} ({}): {} edges in store, {} repositories updated in {} ms",
        label, report.mode, outcome.edges_count, report.repos_touched, report.elapsed_ms
    );
    for (kind, count) in &report.written {
        println!("  {} {count}", global.kind(*kind));
    }
    if !report.removed_repos.is_empty() {
        println!("  removed: {}", report.removed_repos.join(", "));
    }
    for failure in &report.failures.failures {
        eprintln!("{}", global.warning(&format!("{} failed: {}", failure.kind, failure.error)));
    }
    Ok(())
}

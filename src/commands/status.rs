// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Status command - computation timestamps and graph summary

use super::Global;
use anyhow::Result;
use chrono::{DateTime, Utc};

fn stamp(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Run the status command
pub fn run(global: &Global, stale_only: bool) -> Result<()> {
    let service = global.open()?;

    if stale_only {
        let stale = service.stale_repos();
        if global.json {
            return global.print_json(&stale);
        }
        if stale.is_empty() {
            println!("Every repository is up to date.");
        }
        for repo in &stale {
            println!("{}", global.repo(repo));
        }
        return Ok(());
    }

    let rows = service.status();
    if global.json {
        return global.print_json(&rows);
    }

    let summary = service.summary();
    println!(
        "{} repositories, {} collections, {} edges (schema v{})",
        summary.repositories, summary.collections, summary.total_edges, summary.schema_version
    );
    for (kind, count) in &summary.edges {
        println!("  {} {count}", global.kind(*kind));
    }
    match (summary.cache.params, summary.cache.stale) {
        (Some(params), stale) => println!(
            "Projection: {} nodes, {} edges (top_n={}, k={}){}",
            summary.cache.nodes,
            summary.cache.edges,
            params.top_n,
            params.k,
            if stale { ", stale" } else { "" }
        ),
        (None, _) => println!("Projection: not computed"),
    }
    if !summary.stale.is_empty() {
        println!("{} repositories need a rebuild", summary.stale.len());
    }

    if !rows.is_empty() {
        println!();
        println!("{:<40} {:<20} {:<20}", "REPOSITORY", "EDGES COMPUTED", "MANIFEST PARSED");
        for row in &rows {
            println!(
                "{:<40} {:<20} {:<20}",
                row.repo_id,
                stamp(row.edges_computed_at),
                stamp(row.dependencies_parsed_at)
            );
        }
    }
    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Projection command - the bounded network view

use super::Global;
use anyhow::Result;

/// Run the projection command
pub fn run(global: &Global, top_n: Option<usize>, k: Option<usize>, refresh: bool) -> Result<()> {
    let service = global.open()?;
    let view = service.projection(top_n, k, refresh)?;

    if let Some(warning) = &view.warning {
        eprintln!("{}", global.warning(&format!("{warning}; pass --refresh to recompute")));
    }

    if global.json {
        return global.print_json(&view);
    }

    let snapshot = &view.snapshot;
    println!(
        "{} nodes, {} edges, {} components (top_n={}, k={}, {})",
        snapshot.nodes.len(),
        snapshot.edges.len(),
        snapshot.components,
        snapshot.params.top_n,
        snapshot.params.k,
        if view.cached { "cached" } else { "fresh" }
    );
    for node in &snapshot.nodes {
        println!("  {:<40} {:>8.4}  degree {}", global.repo(&node.id), node.importance, node.degree);
    }
    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Edges command - list the relationships of one repository

use super::Global;
use crate::types::EdgeKind;
use anyhow::Result;

/// Run the edges command
pub fn run(global: &Global, repo: &str, kinds: &[EdgeKind]) -> Result<()> {
    let service = global.open()?;
    let filter = (!kinds.is_empty()).then_some(kinds);
    let edges = service.edges(repo, filter)?;

    if global.json {
        return global.print_json(&edges);
    }

    if edges.is_empty() {
        println!("No edges for {}. Run 'stargraph rebuild' first.", global.repo(repo));
        return Ok(());
    }

    println!("{} ({} edges)", global.repo(repo), edges.len());
    for edge in &edges {
        let arrow = match (edge.edge_type.is_directional(), edge.source_repo == repo) {
            (false, _) => "<->",
            (true, true) => "-->",
            (true, false) => "<--",
        };
        let other = edge.other_endpoint(repo).unwrap_or_default();
        println!("  {} {:.4}  {arrow} {other}", global.kind(edge.edge_type), edge.weight);
    }
    Ok(())
}

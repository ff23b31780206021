// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Forget command - drop a removed repository from the graph

use super::Global;
use anyhow::Result;
use serde_json::json;

/// Run the forget command
pub fn run(global: &Global, repo: &str) -> Result<()> {
    let service = global.open()?;
    let removed = service.delete_repo(repo)?;

    if global.json {
        return global.print_json(&json!({ "repo": repo, "edges_removed": removed }));
    }

    if removed > 0 {
        println!("Removed {removed} edge(s) of {}", global.repo(repo));
    } else {
        println!("No edges found for {}", global.repo(repo));
    }
    if service.corpus().contains(repo) {
        println!("{} is still in the corpus; the next rebuild will relink it.", repo);
    }
    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Recommend command - ranked related repositories

use super::Global;
use crate::types::EdgeKind;
use anyhow::Result;

/// Run the recommend command
pub fn run(global: &Global, repo: &str, limit: Option<usize>) -> Result<()> {
    let service = global.open()?;
    let recommendations = service.recommendations(repo, limit)?;

    if global.json {
        return global.print_json(&recommendations);
    }

    if recommendations.is_empty() {
        println!("No recommendations for {}", global.repo(repo));
        return Ok(());
    }

    println!("Recommendations for {}:", global.repo(repo));
    for (rank, rec) in recommendations.iter().enumerate() {
        let sources: Vec<&str> = rec.sources.iter().map(EdgeKind::as_str).collect();
        println!(
            "{:>3}. {:<40} {:.4}  [{}]",
            rank + 1,
            rec.name_with_owner,
            rec.final_score,
            sources.join(", ")
        );
    }
    Ok(())
}

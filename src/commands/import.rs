// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Import command - replace the corpus document of the data directory

use super::Global;
use crate::corpus::CorpusDocument;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Run the import command
pub fn run(global: &Global, path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let doc: CorpusDocument = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse corpus {}", path.display()))?;

    let mut service = global.open()?;
    let count = service.import_corpus(doc)?;
    let stale = service.stale_repos().len();

    if global.json {
        return global.print_json(&serde_json::json!({ "repositories": count, "stale": stale }));
    }
    println!("Imported {count} repositories ({stale} need a rebuild)");
    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Export command - writes the projection as DOT or JSON

use super::Global;
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Graphviz DOT format
    #[value(alias = "graphviz")]
    Dot,
    /// JSON format
    Json,
}

impl ExportFormat {
    /// Get file extension for format
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Dot => "dot",
            Self::Json => "json",
        }
    }
}

/// Run the export command
pub fn run(
    global: &Global,
    format: ExportFormat,
    output: Option<PathBuf>,
    top_n: Option<usize>,
    k: Option<usize>,
) -> Result<()> {
    info!("Exporting projection as {}", format.extension());

    let service = global.open()?;
    let view = service.projection(top_n, k, false)?;

    if view.snapshot.nodes.is_empty() {
        eprintln!("{}", global.warning("Graph is empty. Run 'stargraph rebuild' first."));
    }
    if let Some(warning) = &view.warning {
        eprintln!("{}", global.warning(&warning.to_string()));
    }

    let content = match format {
        ExportFormat::Dot => view.snapshot.to_dot(),
        ExportFormat::Json => serde_json::to_string_pretty(&view.snapshot)?,
    };

    match output {
        Some(path) => {
            fs::write(&path, &content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }

    Ok(())
}

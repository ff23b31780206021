// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Migrate command - bring the data directory to the current schema

use super::Global;
use crate::schema::{self, DataLayout, SCHEMA_VERSION};
use anyhow::{Context, Result};

/// Run the migrate command
pub fn run(global: &Global) -> Result<()> {
    let settings = global.settings()?;
    let layout = DataLayout::new(&settings.data_dir);
    let previous = schema::ensure(&layout)
        .with_context(|| format!("Failed to migrate {}", layout.root().display()))?;

    if global.json {
        return global.print_json(&serde_json::json!({
            "data_dir": layout.root(),
            "from": previous,
            "to": SCHEMA_VERSION,
        }));
    }
    if previous == SCHEMA_VERSION {
        println!("{} is already at schema v{SCHEMA_VERSION}", layout.root().display());
    } else {
        println!(
            "Migrated {} from schema v{previous} to v{SCHEMA_VERSION}",
            layout.root().display()
        );
    }
    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Config command - show the effective configuration

use super::Global;
use anyhow::{Context, Result};

/// Run the config command
///
/// `key` is a dotted path such as `fusion.weights.semantic`; without it the
/// whole configuration is printed as TOML.
pub fn run(global: &Global, key: Option<&str>) -> Result<()> {
    let settings = global.settings()?;

    let Some(key) = key else {
        if global.json {
            return global.print_json(&settings);
        }
        let rendered = toml::to_string_pretty(&settings).context("Failed to render configuration")?;
        print!("{rendered}");
        return Ok(());
    };

    let tree = serde_json::to_value(&settings)?;
    let value = key
        .split('.')
        .try_fold(&tree, |node, part| node.get(part))
        .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {key}"))?;

    if global.json {
        return global.print_json(value);
    }
    match value {
        serde_json::Value::String(s) => println!("{s}"),
        other => println!("{other}"),
    }
    Ok(())
}

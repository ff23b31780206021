// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Data directory layout and idempotent schema versioning
//!
//! Every file in the data directory is JSON. Migrations are additive and may
//! be applied any number of times; they never touch graph semantics.

use crate::error::{GraphError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Schema marker file
pub const SCHEMA_FILE: &str = "schema.json";
/// Upstream corpus document
pub const CORPUS_FILE: &str = "corpus.json";
/// Edge table
pub const EDGES_FILE: &str = "edges.json";
/// Per-repository status table
pub const STATUS_FILE: &str = "graph_status.json";
/// Persisted projection snapshot
pub const NETWORK_CACHE_FILE: &str = "network_cache.json";

/// Contents of `schema.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMarker {
    /// Version the directory has been migrated to
    pub version: u32,
    /// When the last migration step ran
    pub migrated_at: DateTime<Utc>,
}

/// Resolved file locations inside a data directory
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `schema.json`
    #[must_use]
    pub fn schema(&self) -> PathBuf {
        self.root.join(SCHEMA_FILE)
    }

    /// Path of `corpus.json`
    #[must_use]
    pub fn corpus(&self) -> PathBuf {
        self.root.join(CORPUS_FILE)
    }

    /// Path of `edges.json`
    #[must_use]
    pub fn edges(&self) -> PathBuf {
        self.root.join(EDGES_FILE)
    }

    /// Path of `graph_status.json`
    #[must_use]
    pub fn status(&self) -> PathBuf {
        self.root.join(STATUS_FILE)
    }

    /// Path of `network_cache.json`
    #[must_use]
    pub fn network_cache(&self) -> PathBuf {
        self.root.join(NETWORK_CACHE_FILE)
    }
}

/// Bring `layout` up to [`SCHEMA_VERSION`]; returns the version found before
///
/// v1 creates the directory and empty edge/status tables.
/// v2 adds the `params` block to a persisted network cache written by v1.
pub fn ensure(layout: &DataLayout) -> Result<u32> {
    fs::create_dir_all(layout.root()).map_err(|e| GraphError::io(layout.root(), e))?;

    let found = read_json::<SchemaMarker>(&layout.schema())?.map_or(0, |m| m.version);
    if found > SCHEMA_VERSION {
        return Err(GraphError::Schema(format!(
            "data directory {} is at schema v{found}, newer than supported v{SCHEMA_VERSION}",
            layout.root().display()
        )));
    }

    if found < 1 {
        migrate_v1(layout)?;
    }
    if found < 2 {
        migrate_v2(layout)?;
    }

    if found < SCHEMA_VERSION {
        write_json_atomic(
            &layout.schema(),
            &SchemaMarker {
                version: SCHEMA_VERSION,
                migrated_at: Utc::now(),
            },
        )?;
        info!(
            "Migrated {} from schema v{found} to v{SCHEMA_VERSION}",
            layout.root().display()
        );
    } else {
        debug!("Schema v{found} is current");
    }

    Ok(found)
}

fn migrate_v1(layout: &DataLayout) -> Result<()> {
    if !layout.edges().exists() {
        write_json_atomic(&layout.edges(), &serde_json::json!({ "edges": [] }))?;
    }
    if !layout.status().exists() {
        write_json_atomic(&layout.status(), &serde_json::json!({ "rows": [] }))?;
    }
    Ok(())
}

fn migrate_v2(layout: &DataLayout) -> Result<()> {
    let path = layout.network_cache();
    let Some(cache) = read_json::<serde_json::Value>(&path)? else {
        return Ok(());
    };
    if cache.get("params").is_some() {
        return Ok(());
    }
    // a v1 snapshot lacks the fields a v2 one needs; the next read recomputes it
    fs::remove_file(&path).map_err(|e| GraphError::io(&path, e))?;
    info!("Dropped v1 projection cache {}", path.display());
    Ok(())
}

/// Read a JSON file, `None` when it does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Serialize `value` next to `path`, then rename it into place
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GraphError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| GraphError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| GraphError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path().join("data"));

        assert_eq!(ensure(&layout).unwrap(), 0);
        assert!(layout.edges().exists());
        assert!(layout.status().exists());

        let before = fs::read_to_string(layout.schema()).unwrap();
        assert_eq!(ensure(&layout).unwrap(), SCHEMA_VERSION);
        assert_eq!(ensure(&layout).unwrap(), SCHEMA_VERSION);
        assert_eq!(fs::read_to_string(layout.schema()).unwrap(), before);
    }

    #[test]
    fn test_v1_cache_is_dropped() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        write_json_atomic(
            &layout.schema(),
            &SchemaMarker { version: 1, migrated_at: Utc::now() },
        )
        .unwrap();
        write_json_atomic(
            &layout.network_cache(),
            &serde_json::json!({ "nodes": [], "edges": [], "top_n": 50, "k": 3 }),
        )
        .unwrap();

        assert_eq!(ensure(&layout).unwrap(), 1);
        assert!(!layout.network_cache().exists());
        assert_eq!(ensure(&layout).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_refuses_newer_schema() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        write_json_atomic(
            &layout.schema(),
            &SchemaMarker { version: SCHEMA_VERSION + 1, migrated_at: Utc::now() },
        )
        .unwrap();

        assert!(matches!(ensure(&layout), Err(GraphError::Schema(_))));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error taxonomy for the graph engine

use crate::types::EdgeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Library result alias
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Typed failures surfaced by the engine
#[derive(Debug, Error)]
pub enum GraphError {
    /// Rejected at the boundary, never persisted
    #[error("validation failed: {0}")]
    Validation(String),

    /// Query against a repository the engine does not know
    #[error("repository not found: {0}")]
    NotFound(String),

    /// Every extractor of a rebuild failed
    #[error("rebuild failed: {0}")]
    NoKindSucceeded(PartialRebuildFailure),

    /// A single extractor failed
    #[error("{kind} extractor failed: {message}")]
    Extractor {
        /// Kind whose extractor failed
        kind: EdgeKind,
        /// Failure detail
        message: String,
    },

    /// Data directory layout problem
    #[error("schema error: {0}")]
    Schema(String),

    /// Filesystem failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// Shorthand for a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a validation error
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// One failed kind of a rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindFailure {
    /// The kind whose extraction or write failed
    pub kind: EdgeKind,
    /// Rendered error
    pub error: String,
}

/// Per-kind failures of a rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRebuildFailure {
    /// Failed kinds in the order they were observed
    pub failures: Vec<KindFailure>,
}

impl PartialRebuildFailure {
    /// Whether nothing failed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record a failure
    pub fn push(&mut self, kind: EdgeKind, error: impl fmt::Display) {
        self.failures.push(KindFailure {
            kind,
            error: error.to_string(),
        });
    }

    /// Kinds that failed
    #[must_use]
    pub fn kinds(&self) -> Vec<EdgeKind> {
        self.failures.iter().map(|f| f.kind).collect()
    }
}

impl fmt::Display for PartialRebuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} edge kind(s) failed", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} ({})", failure.kind, failure.error)?;
        }
        Ok(())
    }
}

/// Soft signal attached to a projection read that may be outdated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleCacheWarning {
    /// When the served snapshot was computed
    pub cache_updated_at: DateTime<Utc>,
    /// Latest `edges_computed_at` across the status table
    pub latest_status_at: Option<DateTime<Utc>>,
}

impl fmt::Display for StaleCacheWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projection computed at {} predates the latest graph change",
            self.cache_updated_at.to_rfc3339()
        )?;
        if let Some(latest) = self.latest_status_at {
            write!(f, " ({})", latest.to_rfc3339())?;
        }
        Ok(())
    }
}

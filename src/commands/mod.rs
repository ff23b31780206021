// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod config;
pub mod edges;
pub mod export;
pub mod forget;
pub mod import;
pub mod migrate;
pub mod projection;
pub mod rebuild;
pub mod recommend;
pub mod status;

use crate::config::{load, Settings};
use crate::service::GraphService;
use crate::types::EdgeKind;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::PathBuf;

/// Flags shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct Global {
    /// Configuration file
    pub config: Option<PathBuf>,
    /// Data directory override
    pub data_dir: Option<PathBuf>,
    /// Print JSON instead of text
    pub json: bool,
    /// Colorize text output
    pub color: bool,
}

impl Global {
    /// Settings from the config file and environment, with the data
    /// directory override applied
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = load(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            settings.data_dir.clone_from(dir);
        }
        Ok(settings)
    }

    /// Open the graph service over the configured data directory
    pub fn open(&self) -> Result<GraphService> {
        let settings = self.settings()?;
        let dir = settings.data_dir.clone();
        GraphService::open(settings).with_context(|| format!("Failed to open data directory {}", dir.display()))
    }

    /// Print `value` as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Repository name, bold when colors are on
    #[must_use]
    pub fn repo(&self, name: &str) -> String {
        if self.color {
            name.bold().to_string()
        } else {
            name.to_string()
        }
    }

    /// Edge kind label, colored per kind
    #[must_use]
    pub fn kind(&self, kind: EdgeKind) -> String {
        let label = format!("{kind:<10}");
        if !self.color {
            return label;
        }
        match kind {
            EdgeKind::Author => label.cyan().to_string(),
            EdgeKind::Dependency => label.magenta().to_string(),
            EdgeKind::Ecosystem => label.green().to_string(),
            EdgeKind::Collection => label.blue().to_string(),
            EdgeKind::Semantic => label.yellow().to_string(),
        }
    }

    /// Warning line, yellow when colors are on
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        if self.color {
            format!("{} {message}", "warning:".yellow().bold())
        } else {
            format!("warning: {message}")
        }
    }
}

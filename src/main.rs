// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Stargraph CLI - relationship graph for your starred repositories

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use stargraph::commands::{self, export::ExportFormat, Global};
use stargraph::types::EdgeKind;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stargraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "STARGRAPH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, env = "STARGRAPH_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true, value_parser = clap::builder::FalseyValueParser::new())]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the corpus with a JSON document
    Import {
        /// Corpus document (repositories and collections)
        path: PathBuf,
    },

    /// Recompute edges from the corpus
    Rebuild {
        /// Only recompute edges incident to these repositories
        #[arg(long = "repo", value_name = "OWNER/NAME")]
        repos: Vec<String>,

        /// Only recompute repositories changed since their last computation
        #[arg(long, conflicts_with = "repos")]
        stale: bool,
    },

    /// List the edges of a repository
    Edges {
        /// Repository (owner/name)
        repo: String,

        /// Restrict to these kinds
        #[arg(long = "kind", value_delimiter = ',')]
        kinds: Vec<EdgeKind>,
    },

    /// Show computation status
    Status {
        /// Only list repositories needing a rebuild
        #[arg(long)]
        stale: bool,
    },

    /// Recommend related repositories
    Recommend {
        /// Repository (owner/name)
        repo: String,

        /// Maximum number of recommendations
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the bounded network projection
    Projection {
        /// Repositories retained
        #[arg(long)]
        top_n: Option<usize>,

        /// Edges kept per repository
        #[arg(short)]
        k: Option<usize>,

        /// Recompute even when a matching snapshot is cached
        #[arg(long)]
        refresh: bool,
    },

    /// Export the projection to various formats
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Dot)]
        format: ExportFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Repositories retained
        #[arg(long)]
        top_n: Option<usize>,

        /// Edges kept per repository
        #[arg(short)]
        k: Option<usize>,
    },

    /// Remove every edge of a repository
    Forget {
        /// Repository (owner/name)
        repo: String,
    },

    /// Migrate the data directory to the current schema
    Migrate,

    /// Show the effective configuration
    Config {
        /// Dotted configuration key (omit to print everything)
        key: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let global = Global {
        config: cli.config.clone(),
        data_dir: cli.data_dir.clone(),
        json: cli.json,
        color: !cli.no_color && std::io::stdout().is_terminal(),
    };

    // Initialize logging; flags win over the configured level
    let configured = global.settings().map(|s| s.log_level);
    let level = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        0 => configured.as_deref().unwrap_or("info").to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(execute(cli.command, &global));
    // timed-out extractors may still hold blocking threads
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn execute(command: Commands, global: &Global) -> Result<()> {
    match command {
        Commands::Import { path } => commands::import::run(global, &path),
        Commands::Rebuild { repos, stale } => commands::rebuild::run(global, repos, stale).await,
        Commands::Edges { repo, kinds } => commands::edges::run(global, &repo, &kinds),
        Commands::Status { stale } => commands::status::run(global, stale),
        Commands::Recommend { repo, limit } => commands::recommend::run(global, &repo, limit),
        Commands::Projection { top_n, k, refresh } => commands::projection::run(global, top_n, k, refresh),
        Commands::Export { format, output, top_n, k } => {
            commands::export::run(global, format, output, top_n, k)
        }
        Commands::Forget { repo } => commands::forget::run(global, &repo),
        Commands::Migrate => commands::migrate::run(global),
        Commands::Config { key } => commands::config::run(global, key.as_deref()),
        Commands::Completions { shell } => commands::completions::run(shell, &mut Cli::command()),
    }
}

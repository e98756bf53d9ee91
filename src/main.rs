//! # Passage CLI (`psg`)
//!
//! The `psg` binary looks up references across every configured content
//! source, manages the local cache, and can serve the same search over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! psg --config ./config/passage.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `psg init` | Create the SQLite cache and run schema migrations |
//! | `psg sources` | List configured sources and their status |
//! | `psg search "<query>"` | Search all sources and print ranked results |
//! | `psg cache stats` | Show cached record counts |
//! | `psg cache clear` | Drop every cached record |
//! | `psg serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! psg search "John 3:16"
//! psg search "Gen 1:1-3; Ps 23 KJV" --json
//! psg search "2 Kings 2" --book-type bible --limit 5
//! ```
//!
//! Logs go to stderr and are controlled with `RUST_LOG`
//! (default `passage=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use passage::{config, migrate, search, server, sources, stats};

/// Passage: reference lookup across decentralized content sources.
#[derive(Parser)]
#[command(
    name = "psg",
    about = "Passage: reference lookup across decentralized content sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/passage.toml`. When the file is missing, a
    /// minimal configuration with no sources and an in-memory cache is used.
    #[arg(long, global = true, default_value = "./config/passage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the cache database schema.
    ///
    /// Idempotent. Requires `[cache].path`.
    Init,

    /// List configured sources and whether they look reachable.
    Sources,

    /// Search every source for a reference.
    Search {
        /// Free-form query, e.g. `"Rom 8:28 ESV"`.
        query: String,

        /// Collection to search (defaults to `[search].book_type`).
        #[arg(long)]
        book_type: Option<String>,

        /// Print the full outcome as JSON.
        #[arg(long)]
        json: bool,

        /// Maximum number of results to print.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Inspect or clear the local cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show record counts per kind and per source.
    Stats,
    /// Remove every cached record.
    Clear,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passage=info,passage_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &std::path::Path) -> anyhow::Result<config::Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(config::Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Cache initialized.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Search {
            query,
            book_type,
            json,
            limit,
        } => {
            search::run_search(&cfg, &query, book_type, json, limit).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats => stats::run_cache_stats(&cfg).await?,
            CacheAction::Clear => stats::run_cache_clear(&cfg).await?,
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

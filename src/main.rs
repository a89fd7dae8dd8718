//! # Profile Harvest CLI (`harvest`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Create the SQLite store and its indexes |
//! | `harvest sources` | List adapters, their targets, and readiness |
//! | `harvest sync <all\|adapter>` | Run an ingestion pass |
//! | `harvest search "<query>"` | Search stored profiles |
//! | `harvest stats` | Store totals and per-platform breakdown |
//! | `harvest query <tool>` | Call one analytic tool and print JSON |
//! | `harvest serve` | Start the HTTP + MCP tool server |
//!
//! ## Examples
//!
//! ```bash
//! harvest init --config ./config/harvest.toml
//! harvest sync stackoverflow --target 200
//! harvest search "machine learning" --mode keyword
//! harvest query get_top_contributors --param platform=GitHub --param metric=followers
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use profile_harvest::{config, ingest, migrate, search, server, sources, stats};

/// Profile Harvest: collect public developer and researcher profiles into
/// one canonical store and query it.
///
/// All commands accept `--config`. A missing file means built-in defaults;
/// `HARVEST_*` and `SCRAPE_*` environment variables (also read from `.env`)
/// override the file.
#[derive(Parser)]
#[command(name = "harvest", version, about = "Multi-source public profile ingestion")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store schema. Safe to run repeatedly.
    Init,

    /// List adapters with enablement, target, and prerequisite status.
    Sources,

    /// Run an ingestion pass.
    ///
    /// Adapters run one at a time in a fixed order (stackoverflow, github,
    /// orcid, kaggle, linkedin) with a randomized pause between them.
    Sync {
        /// `all` or one adapter: github, stackoverflow, orcid, kaggle, linkedin.
        adapter: String,

        /// New profiles to save before stopping, overriding the configured target.
        #[arg(long)]
        target: Option<usize>,
    },

    /// Search stored profiles.
    Search {
        query: String,

        /// `substring` (name, headline, location, platform, skills) or
        /// `keyword` (full-text, ranked).
        #[arg(long, default_value = "substring")]
        mode: String,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show store statistics.
    Stats,

    /// Call one analytic tool and print its JSON result.
    Query {
        /// Tool name, e.g. `find_top_experts`.
        tool: String,

        /// Tool parameters as `key=value` pairs.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Start the HTTP tool server with the MCP endpoint at `/mcp`.
    Serve,
}

/// Parse a `key=value` pair for `--param` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("profile_harvest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Store initialized at {}", cfg.db.path().display());
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Sync { adapter, target } => {
            ingest::run_sync(&cfg, &adapter, target).await?;
        }
        Commands::Search { query, mode, limit } => {
            search::run_search(&cfg, &query, &mode, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Query { tool, params } => {
            search::run_query(&cfg, &tool, &params).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

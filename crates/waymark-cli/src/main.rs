//! Waymark
//!
//! Federated place search across every collection a user can see.
//!
//! # Usage
//!
//! ```bash
//! waymark candidates --catalog catalog.json --user u1 [--role admin] [--active home]
//! waymark search --catalog catalog.json --user u1 [--limit 10] [--json] "bakery"
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/waymark/config.toml)
//! 3. Environment variables (WAYMARK_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use waymark_cli::{init_logging, load_settings, run_candidates, run_search, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let limit = match &cli.command {
        Commands::Search { limit, .. } => *limit,
        Commands::Candidates { .. } => None,
    };
    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref(), limit)?;
    init_logging(&settings)?;

    match &cli.command {
        Commands::Candidates { viewer } => {
            run_candidates(&settings, viewer).await?;
        }
        Commands::Search {
            viewer,
            query,
            json,
            ..
        } => {
            run_search(&settings, viewer, query, *json).await?;
        }
    }

    Ok(())
}

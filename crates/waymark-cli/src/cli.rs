//! CLI argument parsing for the waymark binary.
//!
//! CLI flags override every other config source.

use clap::{Args, Parser, Subcommand};
use waymark_types::Role;

/// Waymark place index
///
/// Searches places across every collection a user can see.
#[derive(Parser, Debug)]
#[command(name = "waymark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/waymark/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Who is searching, and from which catalog.
#[derive(Args, Debug, Clone)]
pub struct ViewerArgs {
    /// Catalog file (JSON)
    #[arg(long)]
    pub catalog: String,

    /// Signed-in user id
    #[arg(short, long)]
    pub user: String,

    /// Viewer role (guest, ordinary, admin)
    #[arg(short, long, default_value = "ordinary")]
    pub role: Role,

    /// Active collection id
    #[arg(short, long)]
    pub active: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the ordered list of searchable collections
    Candidates {
        #[command(flatten)]
        viewer: ViewerArgs,
    },

    /// Fetch every candidate collection and search across them
    Search {
        #[command(flatten)]
        viewer: ViewerArgs,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Search text (empty lists everything)
        #[arg(default_value = "")]
        query: String,
    },
}

impl Commands {
    pub fn viewer(&self) -> &ViewerArgs {
        match self {
            Commands::Candidates { viewer } | Commands::Search { viewer, .. } => viewer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_candidates() {
        let cli = Cli::parse_from(["waymark", "candidates", "--catalog", "c.json", "--user", "u1"]);
        match cli.command {
            Commands::Candidates { viewer } => {
                assert_eq!(viewer.catalog, "c.json");
                assert_eq!(viewer.user, "u1");
                assert_eq!(viewer.role, Role::Ordinary);
                assert!(viewer.active.is_none());
            }
            _ => panic!("Expected Candidates command"),
        }
    }

    #[test]
    fn test_cli_search_with_query() {
        let cli = Cli::parse_from([
            "waymark", "search", "--catalog", "c.json", "-u", "u1", "--role", "admin", "-a",
            "home", "-n", "5", "corner bakery",
        ]);
        match cli.command {
            Commands::Search {
                viewer,
                limit,
                json,
                query,
            } => {
                assert_eq!(viewer.role, Role::Admin);
                assert_eq!(viewer.active.as_deref(), Some("home"));
                assert_eq!(limit, Some(5));
                assert!(!json);
                assert_eq!(query, "corner bakery");
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_empty_query() {
        let cli = Cli::parse_from(["waymark", "search", "--catalog", "c.json", "-u", "u1"]);
        match cli.command {
            Commands::Search { query, .. } => assert!(query.is_empty()),
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_role() {
        let result = Cli::try_parse_from([
            "waymark", "candidates", "--catalog", "c.json", "-u", "u1", "--role", "root",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "waymark",
            "--config",
            "/path/to/config.toml",
            "--log-level",
            "debug",
            "candidates",
            "--catalog",
            "c.json",
            "-u",
            "u1",
        ]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert_eq!(cli.command.viewer().user, "u1");
    }
}

//! Waymark CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (candidates, search)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, ViewerArgs};
pub use commands::{
    format_candidates, format_hits, hits_to_json, init_logging, load_settings, open_session,
    run_candidates, run_search, LoggingCollaborators,
};

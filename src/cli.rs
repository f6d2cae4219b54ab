//! CLI argument parsing using clap v4

use clap::{Parser, Subcommand};

/// School of Rebels progression engine
///
/// Tracks member points and ranks, runs study sessions and keeps rank roles
/// in line with each member's rank.
#[derive(Parser, Debug)]
#[command(name = "rebels-progress")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute JSON commands read line by line from stdin
    Serve {
        /// Path to configuration file
        #[arg(short, long, env = "REBELS_CONFIG")]
        config: Option<String>,
    },

    /// Print the configured rank table
    Ranks {
        /// Path to configuration file
        #[arg(short, long, env = "REBELS_CONFIG")]
        config: Option<String>,
    },

    /// Print the leaderboard from the configured store
    Leaderboard {
        /// Path to configuration file
        #[arg(short, long, env = "REBELS_CONFIG")]
        config: Option<String>,

        /// Number of rows (defaults to progression.leaderboard_size)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

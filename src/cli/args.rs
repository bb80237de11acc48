//! CLI argument definitions using clap
//!
//! Commands:
//! - shardlog serve [--config <path>]
//! - shardlog exec [--config <path>]
//! - shardlog check [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// shardlog - sharded, append-only record streams
#[derive(Parser, Debug)]
#[command(name = "shardlog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file; defaults apply when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Answer one JSON request per stdin line until EOF
    Serve,

    /// Answer a single JSON request from stdin and exit
    Exec,

    /// Replay the journal and print a summary of streams and shards
    Check,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

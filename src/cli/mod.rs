//! CLI module for shardlog
//!
//! Provides command-line interface for:
//! - serve: line-delimited JSON requests on stdin until EOF
//! - exec: one request, one response
//! - check: replay the journal and summarize what it holds

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, exec, open_registry, run_command, serve};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_response};

/// Parse arguments, load configuration and run the chosen command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let config = Config::load_or_default(cli.config.as_deref())?;
    run_command(&cli.command, &config)
}

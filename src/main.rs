//! shardlog CLI entry point
//!
//! Parses arguments and hands off to `cli::run`. Errors go to stderr and the
//! process exits non-zero.

use shardlog::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

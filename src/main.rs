//! # Checkout Pool CLI
//!
//! This is the binary entry point for the `checkout-pool` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Resolving the pool configuration and initialising logging.
//! - Executing the appropriate command based on the parsed arguments.
//!
//! The pool itself lives in the `lib.rs` library crate; the binary is a thin
//! wrapper that drives it from the command line.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}

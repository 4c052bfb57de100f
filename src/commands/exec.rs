//! # Exec Command Implementation
//!
//! Acquires a checkout, runs a command inside it, releases the checkout and
//! shuts the pool down. The process exits with the command's exit code.

use std::process::Command;

use anyhow::{Context, Result};
use clap::Args;

use checkout_pool::config::PoolConfig;
use checkout_pool::pool::Pool;
use checkout_pool::suggestions;

/// Run a command inside a checkout
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Repository URL or path.
    #[arg(long, value_name = "URL")]
    pub repo: String,

    /// Revision (branch, tag or commit).
    #[arg(long, value_name = "REV")]
    pub rev: String,

    /// Variant tag as key=value; may be repeated.
    #[arg(long = "variant", value_name = "KEY=VALUE")]
    pub variants: Vec<String>,

    /// Leave the checkout on disk instead of removing it on exit.
    #[arg(long)]
    pub keep: bool,

    /// Command to run, after `--`.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Execute the `exec` command.
pub fn execute(args: ExecArgs, config: &PoolConfig) -> Result<()> {
    let variant = super::parse_variant(&args.variants)?;
    let Some((program, program_args)) = args.command.split_first() else {
        anyhow::bail!("No command given");
    };

    let pool = Pool::with_git(config.clone())?;
    let checkout = pool
        .acquire(&args.repo, &args.rev, &variant)
        .map_err(suggestions::explain)?;
    log::info!("running {} in {}", program, checkout.path().display());

    let status = Command::new(program)
        .args(program_args)
        .current_dir(checkout.path())
        .status();

    pool.release(checkout.key());
    if args.keep {
        drop(pool);
    } else {
        pool.shutdown()?;
    }

    let status = status.with_context(|| format!("Failed to run {program}"))?;
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => std::process::exit(code),
        None => anyhow::bail!("{program} was terminated by a signal"),
    }
}

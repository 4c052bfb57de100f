//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Checkout Pool - Share bounded, reusable repository checkouts
#[derive(Parser, Debug)]
#[command(name = "checkout-pool")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    ///
    /// Ignored when RUST_LOG is set.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    #[command(flatten)]
    pool: commands::PoolArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the checkout key and directory for a repository and revision
    Key(commands::key::KeyArgs),

    /// List checkout directories under the pool root
    Ls(commands::ls::LsArgs),

    /// Remove leftover checkout directories
    Clean(commands::clean::CleanArgs),

    /// Run a command inside a checkout
    Exec(commands::exec::ExecArgs),

    /// Run a file of jobs in parallel through one pool
    Batch(commands::batch::BatchArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let config = self.pool.resolve()?;
        match self.command {
            Commands::Key(args) => commands::key::execute(args, &config),
            Commands::Ls(args) => commands::ls::execute(args, &config),
            Commands::Clean(args) => commands::clean::execute(args, &config),
            Commands::Exec(args) => commands::exec::execute(args, &config),
            Commands::Batch(args) => commands::batch::execute(args, &config),
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // Already initialised when running under the test harness.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

//! # Clean Command Implementation
//!
//! Removes every checkout directory under the pool root. This is an offline
//! sweep for directories left behind by a process that exited without
//! shutting its pool down; it must not be run while a pool is using the
//! same root.

use std::io::{self, Write};

use anyhow::Result;
use clap::Args;

use checkout_pool::cleanup;
use checkout_pool::config::PoolConfig;

use super::ls::{format_size, scan_checkouts};

/// Remove leftover checkout directories
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Show what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt and delete immediately
    #[arg(long)]
    pub yes: bool,
}

/// Execute the `clean` command.
pub fn execute(args: CleanArgs, config: &PoolConfig) -> Result<()> {
    let entries = scan_checkouts(&config.base_dir)?;

    if entries.is_empty() {
        println!("No checkouts found in: {}", config.base_dir.display());
        return Ok(());
    }

    println!("Checkouts to be deleted:\n");
    for entry in &entries {
        println!("  {} ({})", entry.path.display(), format_size(entry.size));
    }
    let total: u64 = entries.iter().map(|e| e.size).sum();
    println!(
        "\nTotal: {} checkouts ({})",
        entries.len(),
        format_size(total)
    );

    if args.dry_run {
        println!("\n🔎 Dry run mode - no changes were made.");
        return Ok(());
    }

    if !args.yes {
        print!("\nDo you want to delete these checkouts? (y/N): ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input != "y" && input != "yes" {
            println!("Clean cancelled.");
            return Ok(());
        }
    }

    println!("\n🗑️  Deleting checkouts...");
    let mut deleted = 0usize;
    let mut failed = 0usize;
    for entry in &entries {
        if cleanup::remove_checkout_dir(&entry.path) {
            deleted += 1;
            println!("  ✅ Deleted: {}", entry.path.display());
        } else {
            failed += 1;
            eprintln!("  ❌ Failed to delete {}", entry.path.display());
        }
    }

    if deleted > 0 {
        println!("\n✅ Successfully deleted {} checkouts.", deleted);
    }
    if failed > 0 {
        anyhow::bail!("Failed to delete {} checkouts", failed);
    }
    Ok(())
}

//! # Ls Command Implementation
//!
//! This module implements the `ls` subcommand, which lists the checkout
//! directories present under the pool root together with their size and
//! file count.
//!
//! The listing reads the disk only. Checkouts belonging to a running pool in
//! another process show up here too, since pool state is not persisted.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use walkdir::WalkDir;

use checkout_pool::cleanup;
use checkout_pool::config::PoolConfig;
use checkout_pool::key::CheckoutKey;

/// List checkout directories under the pool root
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// A checkout directory found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutEntry {
    pub key: CheckoutKey,
    pub path: PathBuf,
    pub size: u64,
    pub file_count: usize,
    /// Seconds since the Unix epoch of the newest file.
    pub last_modified: Option<u64>,
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs, config: &PoolConfig) -> Result<()> {
    let entries = scan_checkouts(&config.base_dir)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No checkouts found in: {}", config.base_dir.display());
        return Ok(());
    }

    println!("{:<14} {:>8} {:>12}  PATH", "KEY", "FILES", "SIZE");
    println!("{}", "-".repeat(80));
    for entry in &entries {
        println!(
            "{:<14} {:>8} {:>12}  {}",
            entry.key.short(),
            entry.file_count,
            format_size(entry.size),
            entry.path.display()
        );
    }
    let total: u64 = entries.iter().map(|e| e.size).sum();
    println!(
        "\nTotal: {} checkouts ({})",
        entries.len(),
        format_size(total)
    );
    Ok(())
}

/// Find every key-named directory under `base_dir` and measure it.
pub fn scan_checkouts(base_dir: &Path) -> Result<Vec<CheckoutEntry>> {
    let dirs = cleanup::checkout_dirs(base_dir)
        .with_context(|| format!("Failed to read {}", base_dir.display()))?;

    Ok(dirs
        .into_iter()
        .map(|(key, path)| {
            let (size, file_count, last_modified) = measure(&path);
            CheckoutEntry {
                key,
                path,
                size,
                file_count,
                last_modified,
            }
        })
        .collect())
}

fn measure(dir: &Path) -> (u64, usize, Option<u64>) {
    let mut size = 0u64;
    let mut file_count = 0usize;
    let mut latest: Option<SystemTime> = None;

    for entry in WalkDir::new(dir).into_iter().flatten() {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        size += meta.len();
        file_count += 1;
        if let Ok(mtime) = meta.modified() {
            latest = Some(latest.map_or(mtime, |t| t.max(mtime)));
        }
    }

    let last_modified = latest
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs());
    (size, file_count, last_modified)
}

/// Format a byte count using binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

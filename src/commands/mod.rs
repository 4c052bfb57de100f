//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `checkout-pool` command-line tool. Each subcommand lives in its own file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` (and, where a pool is
//!   involved, the resolved [`PoolConfig`]) and performs the command's logic.
//!
//! Settings shared by every command (`--root`, `--config`, capacity and grace
//! overrides) are collected in [`PoolArgs`] and resolved once, here.

pub mod batch;
pub mod clean;
pub mod exec;
pub mod key;
pub mod ls;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use checkout_pool::config::{self, PoolConfig};
use checkout_pool::defaults::CONFIG_FILE_NAME;
use checkout_pool::key::Variant;
use checkout_pool::suggestions;

/// Pool settings accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct PoolArgs {
    /// Directory holding the checkouts.
    ///
    /// Defaults to the system cache directory (`~/.cache/checkout-pool` on
    /// Linux, `~/Library/Caches/checkout-pool` on macOS).
    #[arg(long, global = true, value_name = "DIR", env = "CHECKOUT_POOL_ROOT")]
    pub root: Option<PathBuf>,

    /// Path to a checkout-pool.yaml file.
    ///
    /// When omitted, `checkout-pool.yaml` in the current directory is used if
    /// it exists.
    #[arg(long, global = true, value_name = "FILE", env = "CHECKOUT_POOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum number of checkouts kept on disk at once.
    #[arg(long, global = true, value_name = "N")]
    pub max_checkouts: Option<usize>,

    /// How long a released checkout is kept for reuse (e.g. 30s, 5m).
    #[arg(long, global = true, value_name = "DURATION")]
    pub grace: Option<String>,
}

impl PoolArgs {
    /// Resolve the effective configuration.
    ///
    /// Flags override the configuration file, which overrides the built-in
    /// defaults.
    pub fn resolve(&self) -> Result<PoolConfig> {
        let mut pool_config = match self.config_file()? {
            Some(path) => config::from_file(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => PoolConfig::default(),
        };

        if let Some(root) = &self.root {
            pool_config.base_dir = root.clone();
        }
        if let Some(max) = self.max_checkouts {
            pool_config.max_checkouts = max;
        }
        if let Some(grace) = &self.grace {
            pool_config.grace_period = config::parse_duration(grace)?;
        }

        pool_config.validate()?;
        log::debug!("resolved pool configuration: {:?}", pool_config);
        Ok(pool_config)
    }

    fn config_file(&self) -> Result<Option<PathBuf>> {
        match &self.config {
            Some(path) if path.is_file() => Ok(Some(path.clone())),
            Some(path) => Err(suggestions::config_not_found(path)),
            None => {
                let local = Path::new(CONFIG_FILE_NAME);
                Ok(local.is_file().then(|| local.to_path_buf()))
            }
        }
    }
}

/// Parse repeated `--variant k=v` arguments.
pub fn parse_variant(tags: &[String]) -> Result<Variant> {
    Variant::parse_tags(tags).map_err(suggestions::explain)
}

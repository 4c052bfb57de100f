//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Following CLI recommendations,
//! errors should tell users what went wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_pool::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Configuration file not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::config_not_found(path));
//! ```

use std::path::Path;

use crate::error::Error;

/// Generate an error for when the configuration file is not found.
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file not found: {path}\n\n\
         hint: Create a checkout-pool.yaml file, or omit --config to use defaults\n\
         hint: Set CHECKOUT_POOL_CONFIG environment variable",
        path = path.display()
    )
}

/// Generate an error for a malformed `--variant` argument.
pub fn invalid_variant(input: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid variant tag: '{input}'\n\n\
         hint: Variant tags are written key=value (e.g. --variant arch=arm64)\n\
         hint: Repeat --variant for several tags; their order does not matter"
    )
}

/// Generate an error for when every checkout slot is busy.
pub fn pool_exhausted(capacity: usize) -> anyhow::Error {
    anyhow::anyhow!(
        "All {capacity} checkout slots are in use\n\n\
         hint: Raise max_checkouts in checkout-pool.yaml or pass --max-checkouts\n\
         hint: Lower --jobs so fewer checkouts are requested at once"
    )
}

/// Turns a library error into a CLI error, attaching hints where one helps.
pub fn explain(error: Error) -> anyhow::Error {
    match error {
        Error::Exhausted { capacity } => pool_exhausted(capacity),
        Error::InvalidVariant { input } => invalid_variant(&input),
        other => anyhow::Error::new(other),
    }
}

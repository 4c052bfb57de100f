//! # Key Command Implementation
//!
//! Prints the checkout key for a (repository, revision, variant) triple and
//! the directory it maps to under the pool root. Directory names are opaque
//! digests, so this is the way to find the checkout for a given request.

use anyhow::Result;
use clap::Args;

use checkout_pool::config::PoolConfig;
use checkout_pool::key::CheckoutKey;

/// Print the checkout key and directory for a request
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Repository URL or path.
    #[arg(long, value_name = "URL")]
    pub repo: String,

    /// Revision (branch, tag or commit).
    #[arg(long, value_name = "REV")]
    pub rev: String,

    /// Variant tag as key=value; may be repeated.
    #[arg(long = "variant", value_name = "KEY=VALUE")]
    pub variants: Vec<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the `key` command.
pub fn execute(args: KeyArgs, config: &PoolConfig) -> Result<()> {
    let variant = super::parse_variant(&args.variants)?;
    let key = CheckoutKey::derive(&args.repo, &args.rev, &variant);
    let path = config.base_dir.join(key.to_hex());

    if args.json {
        let output = serde_json::json!({
            "key": key,
            "path": path,
            "repository": args.repo,
            "revision": args.rev,
            "variant": variant,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{key}");
        println!("{}", path.display());
    }
    Ok(())
}

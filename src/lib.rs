//! # Checkout Pool Library
//!
//! This library keeps a bounded set of revision-control checkouts on disk and
//! hands them out to concurrent callers. Requests for the same repository,
//! revision, and variant share one working directory; released directories
//! linger for a grace period so that a follow-up request can reuse them
//! instead of checking out again.
//!
//! ## Quick Example
//!
//! ```no_run
//! use checkout_pool::config::PoolConfig;
//! use checkout_pool::key::Variant;
//! use checkout_pool::pool::Pool;
//!
//! let pool = Pool::with_git(PoolConfig::new("/tmp/checkouts").with_max_checkouts(2))?;
//!
//! let checkout = pool.acquire("https://github.com/rust-lang/log.git", "master", &Variant::new())?;
//! println!("working in {}", checkout.path().display());
//! pool.release(checkout.key());
//!
//! pool.shutdown()?;
//! # Ok::<(), checkout_pool::error::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Keys (`key`)**: a stable SHA-256 digest of (repository, revision,
//!   variant tags). It names the checkout's directory.
//! - **Pool (`pool`)**: the slot table, the capacity counter, and the
//!   acquire/release logic, all behind one mutex.
//! - **Deferred cleanup (`cleanup`)**: the reaper thread that removes
//!   released checkouts once their grace period has passed.
//! - **Backends (`backend`, `git`)**: the external operation that actually
//!   materializes a checkout. The pool never retries it.
//! - **Configuration (`config`, `defaults`)**: pool settings, loadable from
//!   a `checkout-pool.yaml` file.

pub mod backend;
pub mod cleanup;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod key;
pub mod pool;
pub mod suggestions;

#[cfg(test)]
mod key_proptest;

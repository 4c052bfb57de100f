//! # Checkout Backends
//!
//! The pool never materializes a working directory itself. It hands that job
//! to a [`CheckoutBackend`], an opaque, slow, and fallible operation that is
//! called without the pool lock held and is never retried.
//!
//! [`GitBackend`] is the implementation used by the CLI; it shells out to the
//! system `git`. Tests substitute their own backends to count invocations and
//! inject failures without touching the network.

use std::path::Path;

use crate::config::GitConfig;
use crate::error::Result;
use crate::key::Variant;

/// What to materialize.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutRequest<'a> {
    pub repository: &'a str,
    pub revision: &'a str,
    pub variant: &'a Variant,
}

/// Trait for checkout operations - allows mocking in tests
pub trait CheckoutBackend: Send + Sync {
    /// Populates `destination` with a working directory for `request`.
    ///
    /// On failure the destination may hold partial content; the pool removes
    /// it before returning the capacity unit.
    fn materialize(&self, request: &CheckoutRequest<'_>, destination: &Path) -> Result<()>;
}

/// Backend that runs the system `git` executable.
///
/// Variant tags only isolate directories; they do not change what is fetched.
#[derive(Debug, Clone, Default)]
pub struct GitBackend {
    config: GitConfig,
}

impl GitBackend {
    pub fn new(config: GitConfig) -> Self {
        Self { config }
    }
}

impl CheckoutBackend for GitBackend {
    fn materialize(&self, request: &CheckoutRequest<'_>, destination: &Path) -> Result<()> {
        crate::git::checkout_revision(
            &self.config.program,
            request.repository,
            request.revision,
            self.config.depth,
            destination,
        )
    }
}

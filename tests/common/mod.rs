//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let (pool, backend) = recording_pool(temp.path(), 1, Duration::from_secs(60));
//! ```

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use checkout_pool::backend::{CheckoutBackend, CheckoutRequest};
use checkout_pool::config::PoolConfig;
use checkout_pool::error::{Error, Result};
use checkout_pool::pool::Pool;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{
        checkout_dir_count, git_available, git_fixture, recording_pool, recording_pool_with,
        wait_until, RecordingBackend,
    };
}

/// One call made to a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub repository: String,
    pub revision: String,
    pub destination: PathBuf,
}

/// In-memory backend that writes a marker file and records every call.
///
/// Clones share their call log, so a test can keep one handle while the
/// pool owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    calls: Arc<Mutex<Vec<Call>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    delay: Duration,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every materialization.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make every materialization of `revision` fail after writing a
    /// partial directory.
    pub fn fail_revision(&self, revision: &str) {
        self.failing.lock().unwrap().insert(revision.to_string());
    }

    pub fn heal_revision(&self, revision: &str) {
        self.failing.lock().unwrap().remove(revision);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl CheckoutBackend for RecordingBackend {
    fn materialize(&self, request: &CheckoutRequest<'_>, destination: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(Call {
            repository: request.repository.to_string(),
            revision: request.revision.to_string(),
            destination: destination.to_path_buf(),
        });
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        fs::create_dir_all(destination)?;
        if self.failing.lock().unwrap().contains(request.revision) {
            fs::write(destination.join("partial"), "interrupted")?;
            return Err(Error::CheckoutFailed {
                repository: request.repository.to_string(),
                revision: request.revision.to_string(),
                message: "simulated failure".to_string(),
            });
        }
        fs::write(
            destination.join("REVISION"),
            format!("{}@{}", request.repository, request.revision),
        )?;
        Ok(())
    }
}

/// A pool under `root` backed by a fresh [`RecordingBackend`].
pub fn recording_pool(root: &Path, capacity: usize, grace: Duration) -> (Pool, RecordingBackend) {
    recording_pool_with(root, capacity, grace, RecordingBackend::new())
}

pub fn recording_pool_with(
    root: &Path,
    capacity: usize,
    grace: Duration,
    backend: RecordingBackend,
) -> (Pool, RecordingBackend) {
    let config = PoolConfig::new(root)
        .with_max_checkouts(capacity)
        .with_grace_period(grace);
    let pool = Pool::new(config, backend.clone()).unwrap();
    (pool, backend)
}

/// Number of directories directly under `root`.
pub fn checkout_dir_count(root: &Path) -> usize {
    fs::read_dir(root)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
                .count()
        })
        .unwrap_or(0)
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let give_up = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= give_up {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Check if git is installed; tests that need it skip otherwise.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Creates a git repository with one commit under `dir` and returns its
/// path and branch name.
pub fn git_fixture(dir: &Path) -> (PathBuf, String) {
    let repo = dir.join("origin");
    fs::create_dir_all(&repo).unwrap();
    let git = |args: &[&str]| {
        let output = Command::new("git")
            .args(args)
            .current_dir(&repo)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    };

    git(&["init", "--quiet"]);
    fs::write(repo.join("hello.txt"), "hello from the fixture\n").unwrap();
    git(&["add", "hello.txt"]);
    git(&["commit", "--quiet", "-m", "initial"]);
    let branch = git(&["symbolic-ref", "--short", "HEAD"]);
    (repo, branch)
}
